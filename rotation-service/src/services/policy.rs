//! Per-user time limit resolution.
//!
//! Precedence, highest first: user tag, environment default, built-in
//! fallback. A value that is not a non-negative integer is ignored.

use crate::models::{TimeLimits, UserTags};

pub const DEFAULT_TIME_LIMIT_DAYS: u32 = 60;

/// Environment-level defaults, kept raw so unparseable values fall through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitDefaults {
    pub cli: Option<String>,
    pub login_profile: Option<String>,
}

fn parse_days(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse::<u32>().ok())
}

pub fn resolve_limit(tag_value: Option<&str>, env_default: Option<&str>) -> u32 {
    parse_days(tag_value)
        .or_else(|| parse_days(env_default))
        .unwrap_or(DEFAULT_TIME_LIMIT_DAYS)
}

pub fn resolve_time_limits(tags: &UserTags, defaults: &LimitDefaults) -> TimeLimits {
    TimeLimits::new(
        resolve_limit(tags.cli_time_limit(), defaults.cli.as_deref()),
        resolve_limit(
            tags.login_profile_time_limit(),
            defaults.login_profile.as_deref(),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CLI_TIME_LIMIT_TAG, LOGIN_PROFILE_TIME_LIMIT_TAG};

    #[test]
    fn tag_beats_environment() {
        assert_eq!(resolve_limit(Some("15"), Some("90")), 15);
        assert_eq!(resolve_limit(Some(" 0 "), Some("90")), 0);
    }

    #[test]
    fn environment_beats_fallback() {
        assert_eq!(resolve_limit(None, Some("90")), 90);
        assert_eq!(resolve_limit(Some("soon"), Some("90")), 90);
        assert_eq!(resolve_limit(Some("-5"), Some("90")), 90);
    }

    #[test]
    fn fallback_is_sixty_days() {
        assert_eq!(resolve_limit(None, None), DEFAULT_TIME_LIMIT_DAYS);
        assert_eq!(resolve_limit(Some("x"), Some("y")), 60);
        assert_eq!(resolve_limit(Some(""), Some("1.5")), 60);
    }

    #[test]
    fn resolves_each_limit_independently() {
        let tags: UserTags = [(CLI_TIME_LIMIT_TAG, "30"), (LOGIN_PROFILE_TIME_LIMIT_TAG, "never")]
            .into_iter()
            .collect();
        let defaults = LimitDefaults {
            cli: Some("120".into()),
            login_profile: Some("45".into()),
        };

        assert_eq!(resolve_time_limits(&tags, &defaults), TimeLimits::new(30, 45));
        assert_eq!(
            resolve_time_limits(&UserTags::default(), &LimitDefaults::default()),
            TimeLimits::new(60, 60)
        );
    }
}
