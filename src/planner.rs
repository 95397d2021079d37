use crate::api::models::upload::InitUploadResponse;
use crate::error::UploadClientError;
use crate::types::Result;

/// One contiguous byte range of the file, uploaded as an independent PUT
/// to its pre-signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    pub part_number: u64,
    pub url: String,
    pub offset: u64,
    pub len: u64,
}

impl PartPlan {
    pub fn byte_range(&self) -> (u64, u64) {
        (self.offset, self.offset + self.len)
    }
}

/// Computes the part boundaries for a file from the init response.
///
/// Pure and deterministic: the same `(file_size, init)` pair always yields
/// the same plan. Part *n* covers `[(n-1)*part_size, min(n*part_size, file_size))`;
/// a single-part upload takes the whole file unsliced.
pub fn plan_parts(file_size: u64, init: &InitUploadResponse) -> Result<Vec<PartPlan>> {
    if init.upload_id.as_deref().map_or(true, str::is_empty) {
        return Err(UploadClientError::Plan("init response missing upload_id".to_string()).into());
    }
    if init.parts.is_empty() {
        return Err(UploadClientError::Plan("init response missing part URLs".to_string()).into());
    }

    let total_parts = init.total_parts.unwrap_or(init.parts.len() as u64);
    if total_parts != init.parts.len() as u64 {
        return Err(UploadClientError::Plan(format!(
            "total_parts is {total_parts} but {} part URLs were provided",
            init.parts.len()
        ))
        .into());
    }

    let mut numbers: Vec<u64> = init.parts.iter().map(|p| p.part_number).collect();
    numbers.sort_unstable();
    if numbers != (1..=total_parts).collect::<Vec<u64>>() {
        return Err(UploadClientError::Plan(
            "part numbers are not dense and 1-based".to_string(),
        )
        .into());
    }

    if total_parts == 1 {
        let part = &init.parts[0];
        return Ok(vec![PartPlan {
            part_number: part.part_number,
            url: part.url.clone(),
            offset: 0,
            len: file_size,
        }]);
    }

    let part_size = init
        .part_size
        .unwrap_or_else(|| file_size.div_ceil(total_parts));
    if part_size == 0 {
        return Err(UploadClientError::Plan("part_size is zero".to_string()).into());
    }

    // The last part must start inside the file and all earlier parts must
    // be full; anything else means the server's plan does not match the
    // file we are about to slice.
    let covered = part_size.saturating_mul(total_parts);
    if covered < file_size || part_size.saturating_mul(total_parts - 1) >= file_size {
        return Err(UploadClientError::Plan(format!(
            "part count {total_parts} with part size {part_size} does not cover file of {file_size} bytes"
        ))
        .into());
    }

    let mut plans = Vec::with_capacity(init.parts.len());
    for part in &init.parts {
        let start = (part.part_number - 1) * part_size;
        let end = (part.part_number * part_size).min(file_size);
        plans.push(PartPlan {
            part_number: part.part_number,
            url: part.url.clone(),
            offset: start,
            len: end - start,
        });
    }
    plans.sort_by_key(|plan| plan.part_number);

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::upload::PartUrl;

    fn init_response(total_parts: u64, part_size: u64) -> InitUploadResponse {
        InitUploadResponse {
            upload_id: Some("u-1".to_string()),
            parts: (1..=total_parts)
                .map(|n| PartUrl {
                    part_number: n,
                    url: format!("http://storage/part{n}"),
                })
                .collect(),
            total_parts: Some(total_parts),
            part_size: Some(part_size),
        }
    }

    #[test]
    fn test_25mb_file_with_10mb_parts() {
        const MB: u64 = 1024 * 1024;
        let plans = plan_parts(25 * MB, &init_response(3, 10 * MB)).unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].byte_range(), (0, 10 * MB));
        assert_eq!(plans[1].byte_range(), (10 * MB, 20 * MB));
        assert_eq!(plans[2].byte_range(), (20 * MB, 25 * MB));
    }

    #[test]
    fn test_single_part_takes_whole_file() {
        let plans = plan_parts(123, &init_response(1, 0)).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].byte_range(), (0, 123));
        assert_eq!(plans[0].url, "http://storage/part1");
    }

    #[test]
    fn test_ranges_are_contiguous_and_cover_the_file() {
        for (file_size, part_size) in [
            (25u64, 10u64),
            (30, 10),
            (1, 1),
            (7, 3),
            (1000, 999),
            (4096, 512),
        ] {
            let total_parts = file_size.div_ceil(part_size);
            let plans = plan_parts(file_size, &init_response(total_parts, part_size)).unwrap();

            let mut expected_start = 0;
            for plan in &plans {
                assert_eq!(plan.offset, expected_start, "gap before part {}", plan.part_number);
                assert!(plan.len > 0);
                expected_start = plan.offset + plan.len;
            }
            assert_eq!(expected_start, file_size);
        }
    }

    #[test]
    fn test_planning_is_idempotent() {
        let init = init_response(3, 10);
        let first = plan_parts(25, &init).unwrap();
        let second = plan_parts(25, &init).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_parts_is_a_plan_error() {
        let init = InitUploadResponse {
            upload_id: Some("u-1".to_string()),
            parts: vec![],
            total_parts: Some(0),
            part_size: None,
        };
        let err = plan_parts(100, &init).unwrap_err();
        assert!(err.to_string().contains("part URLs"));
    }

    #[test]
    fn test_missing_upload_id_is_a_plan_error() {
        let mut init = init_response(1, 0);
        init.upload_id = None;
        let err = plan_parts(100, &init).unwrap_err();
        assert!(err.to_string().contains("upload_id"));
    }

    #[test]
    fn test_inconsistent_part_count_is_a_plan_error() {
        // 3 parts of 10 bytes cannot cover 50 bytes.
        let err = plan_parts(50, &init_response(3, 10)).unwrap_err();
        assert!(err.to_string().contains("does not cover"));

        // 3 parts of 10 bytes leave part 3 empty for a 20-byte file.
        let err = plan_parts(20, &init_response(3, 10)).unwrap_err();
        assert!(err.to_string().contains("does not cover"));
    }

    #[test]
    fn test_non_dense_part_numbers_are_rejected() {
        let init = InitUploadResponse {
            upload_id: Some("u-1".to_string()),
            parts: vec![
                PartUrl {
                    part_number: 1,
                    url: "http://storage/part1".to_string(),
                },
                PartUrl {
                    part_number: 3,
                    url: "http://storage/part3".to_string(),
                },
            ],
            total_parts: Some(2),
            part_size: Some(10),
        };
        let err = plan_parts(15, &init).unwrap_err();
        assert!(err.to_string().contains("dense"));
    }
}
