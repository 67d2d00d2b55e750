use std::str::FromStr;

use time::format_description::well_known::Rfc3339;
use time::format_description::OwnedFormatItem;
use time::OffsetDateTime;

/// How result and metadata timestamps are rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TimeFormat {
    #[default]
    Rfc3339,
    /// A `time` format description, e.g. `[year]-[month]-[day] [hour]:[minute]`.
    Description(OwnedFormatItem),
}

impl FromStr for TimeFormat {
    type Err = time::error::InvalidFormatDescription;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("RFC3339") {
            return Ok(TimeFormat::Rfc3339);
        }
        Ok(TimeFormat::Description(
            time::format_description::parse_owned::<2>(s)?,
        ))
    }
}

impl TimeFormat {
    pub fn format(&self, at: OffsetDateTime) -> Result<String, time::error::Format> {
        match self {
            TimeFormat::Rfc3339 => at.format(&Rfc3339),
            TimeFormat::Description(description) => at.format(description),
        }
    }

    pub fn now(&self) -> Result<String, time::error::Format> {
        self.format(OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_rfc3339_is_the_default() {
        let at = datetime!(2024-03-05 07:08:09 UTC);
        assert_eq!(TimeFormat::default().format(at).unwrap(), "2024-03-05T07:08:09Z");
        assert_eq!(
            TimeFormat::from_str("rfc3339").unwrap(),
            TimeFormat::Rfc3339
        );
    }

    #[test]
    fn test_custom_description() {
        let at = datetime!(2024-03-05 07:08:09 UTC);
        let format = TimeFormat::from_str("[year]/[month]/[day] [hour]h").unwrap();
        assert_eq!(format.format(at).unwrap(), "2024/03/05 07h");
    }

    #[test]
    fn test_invalid_description() {
        assert!(TimeFormat::from_str("[nonsense]").is_err());
    }
}
