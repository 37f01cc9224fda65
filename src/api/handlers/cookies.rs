//! `at`/`rt` cookie transport.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE_NAME: &str = "at";
pub const REFRESH_COOKIE_NAME: &str = "rt";

#[derive(Clone, Copy, Debug, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub access_max_age: i64,
    pub refresh_max_age: i64,
}

impl CookieSettings {
    /// Cookie carrying the access credential verbatim.
    pub fn access(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(ACCESS_COOKIE_NAME, token, self.access_max_age)
    }

    /// Cookie carrying the base64 transport form of the refresh credential.
    pub fn refresh(&self, transport: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(REFRESH_COOKIE_NAME, transport, self.refresh_max_age)
    }

    fn build(
        &self,
        name: &str,
        value: &str,
        max_age: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie =
            format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Value of cookie `name`, if present and non-empty.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == name && !val.is_empty()).then(|| val.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secure: bool) -> CookieSettings {
        CookieSettings {
            secure,
            access_max_age: 1800,
            refresh_max_age: 2_592_000,
        }
    }

    #[test]
    fn access_cookie_attributes() -> Result<(), InvalidHeaderValue> {
        let cookie = settings(false).access("a.b.c")?;
        assert_eq!(
            cookie.to_str().unwrap_or_default(),
            "at=a.b.c; Path=/; HttpOnly; SameSite=Lax; Max-Age=1800"
        );
        Ok(())
    }

    #[test]
    fn refresh_cookie_is_secure_when_configured() -> Result<(), InvalidHeaderValue> {
        let cookie = settings(true).refresh("cnQ=")?;
        assert_eq!(
            cookie.to_str().unwrap_or_default(),
            "rt=cnQ=; Path=/; HttpOnly; SameSite=Lax; Max-Age=2592000; Secure"
        );
        Ok(())
    }

    #[test]
    fn extract_keeps_base64_padding() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("at=a.b.c; rt=cnQ=="));
        assert_eq!(
            extract_cookie(&headers, REFRESH_COOKIE_NAME).as_deref(),
            Some("cnQ==")
        );
        assert_eq!(
            extract_cookie(&headers, ACCESS_COOKIE_NAME).as_deref(),
            Some("a.b.c")
        );
    }

    #[test]
    fn extract_reads_every_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("rt=cnQ="));
        assert_eq!(
            extract_cookie(&headers, REFRESH_COOKIE_NAME).as_deref(),
            Some("cnQ=")
        );
    }

    #[test]
    fn extract_ignores_missing_and_empty() {
        let mut headers = HeaderMap::new();
        assert!(extract_cookie(&headers, ACCESS_COOKIE_NAME).is_none());
        headers.insert(COOKIE, HeaderValue::from_static("at=; other=1"));
        assert!(extract_cookie(&headers, ACCESS_COOKIE_NAME).is_none());
    }
}
