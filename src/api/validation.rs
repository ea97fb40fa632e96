use super::ApiError;
use crate::models::media::{MediaStatus, MediaType};
use crate::models::partial_date::PartialDate;

pub const TITLE_MAX_LEN: usize = 255;
pub const PUB_YEAR_MIN: i32 = -4000;
pub const PUB_YEAR_MAX: i32 = 2200;

pub fn validate_media_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid media ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_title(title: &str) -> Result<&str, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Title cannot be empty"));
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(ApiError::validation(format!(
            "Title must be {} characters or less",
            TITLE_MAX_LEN
        )));
    }
    Ok(trimmed)
}

pub fn validate_media_type(raw: &str) -> Result<MediaType, ApiError> {
    raw.parse()
        .map_err(|e: crate::models::media::UnknownVariant| ApiError::validation(e.to_string()))
}

pub fn validate_status(raw: &str) -> Result<MediaStatus, ApiError> {
    raw.parse()
        .map_err(|e: crate::models::media::UnknownVariant| ApiError::validation(e.to_string()))
}

pub fn validate_pub_year(year: Option<i32>) -> Result<Option<i32>, ApiError> {
    if let Some(year) = year
        && !(PUB_YEAR_MIN..=PUB_YEAR_MAX).contains(&year)
    {
        return Err(ApiError::validation(format!(
            "Year must be between {} and {}",
            PUB_YEAR_MIN, PUB_YEAR_MAX
        )));
    }
    Ok(year)
}

pub fn validate_score(score: Option<i32>) -> Result<Option<i32>, ApiError> {
    if let Some(score) = score
        && !(1..=10).contains(&score)
    {
        return Err(ApiError::validation("Score must be between 1 and 10"));
    }
    Ok(score)
}

/// Parses an optional `YYYY[-MM[-DD]]` date; an empty string counts as
/// absent so form submissions round-trip.
pub fn validate_review_date(raw: Option<&str>) -> Result<Option<PartialDate>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("Invalid date: {}", raw))),
    }
}

pub fn validate_limit(limit: u64) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 200;

    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between 1 and {}",
            limit, MAX_LIMIT
        )));
    }
    Ok(limit)
}

pub fn validate_view_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("View name cannot be empty"));
    }
    if trimmed.chars().count() > 100 {
        return Err(ApiError::validation(
            "View name must be 100 characters or less",
        ));
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    let well_formed = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(ApiError::validation(format!(
            "Invalid email address: {}",
            trimmed
        )));
    }
    Ok(trimmed)
}

pub fn validate_new_password(current: &str, new: &str) -> Result<(), ApiError> {
    if new.len() < 8 {
        return Err(ApiError::validation(
            "New password must be at least 8 characters",
        ));
    }
    if current == new {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_media_id() {
        assert!(validate_media_id(1).is_ok());
        assert!(validate_media_id(12345).is_ok());
        assert!(validate_media_id(0).is_err());
        assert!(validate_media_id(-1).is_err());
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Dune  ").unwrap(), "Dune");
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(256)).is_err());
        assert!(validate_title(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn test_validate_enums() {
        assert_eq!(validate_media_type("BOOK").unwrap(), MediaType::Book);
        assert!(validate_media_type("PODCAST").is_err());
        assert_eq!(validate_status("DNF").unwrap(), MediaStatus::Dnf);
        assert!(validate_status("ABANDONED").is_err());
    }

    #[test]
    fn test_validate_pub_year() {
        assert_eq!(validate_pub_year(None).unwrap(), None);
        assert_eq!(validate_pub_year(Some(1965)).unwrap(), Some(1965));
        assert_eq!(validate_pub_year(Some(-800)).unwrap(), Some(-800));
        assert!(validate_pub_year(Some(2201)).is_err());
        assert!(validate_pub_year(Some(-4001)).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert_eq!(validate_score(None).unwrap(), None);
        assert_eq!(validate_score(Some(1)).unwrap(), Some(1));
        assert_eq!(validate_score(Some(10)).unwrap(), Some(10));
        assert!(validate_score(Some(0)).is_err());
        assert!(validate_score(Some(11)).is_err());
    }

    #[test]
    fn test_validate_review_date() {
        assert_eq!(validate_review_date(None).unwrap(), None);
        assert_eq!(validate_review_date(Some("")).unwrap(), None);
        assert_eq!(
            validate_review_date(Some("2024-05")).unwrap().unwrap().to_string(),
            "2024-05"
        );
        assert!(validate_review_date(Some("soon")).is_err());
        assert!(validate_review_date(Some("2024-13")).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(200).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(201).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" kara@example.org ").unwrap(), "kara@example.org");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("kara@localhost").is_err());
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("old-secret", "new-secret").is_ok());
        assert!(validate_new_password("old", "short").is_err());
        assert!(validate_new_password("same-secret", "same-secret").is_err());
    }
}
