//! Video-conference link generation
//!
//! The booking flow relays a room link for paid online consultations. The
//! room service is free and registration-less, but it has no official API:
//! the link is extracted from the room page, so the extraction breaks
//! whenever the page layout changes. A daily health check (see `schedule`)
//! alerts the operations channel when that happens.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::dialogue::render::LinkProvider;

static ROOM_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https://jazz\.sber\.ru/[0-9a-z]{2,}(?:\?psw=[0-9A-Za-z]+)?"#).expect("static regex"));

/// Extracts a conference-room link from the arranged-meeting page
pub struct PageLinkProvider {
    client: reqwest::Client,
    page_url: String,
}

impl PageLinkProvider {
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        Ok(Self {
            client,
            page_url: config::CONFERENCE_PAGE_URL.clone(),
        })
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    /// Finds the first room link in a page body
    fn extract(body: &str) -> Option<&str> {
        ROOM_LINK.find(body).map(|m| m.as_str())
    }
}

#[async_trait]
impl LinkProvider for PageLinkProvider {
    async fn conference_link(&self) -> AppResult<Url> {
        if self.page_url.is_empty() {
            return Err(AppError::LinkProvider("CONFERENCE_PAGE_URL is not configured".to_string()));
        }
        let response = self.client.get(&self.page_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LinkProvider(format!("room page returned {status}")));
        }
        let body = response.text().await?;
        let link = Self::extract(&body)
            .ok_or_else(|| AppError::LinkProvider("no room link found on the page".to_string()))?;
        Ok(Url::parse(link)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_room_link_from_markup() {
        let body = r#"<input value="https://jazz.sber.ru/e81pmb?psw=MDZBURkXExdKERRGSxZFEkYUEw"/>"#;
        assert_eq!(
            PageLinkProvider::extract(body),
            Some("https://jazz.sber.ru/e81pmb?psw=MDZBURkXExdKERRGSxZFEkYUEw")
        );
    }

    #[test]
    fn missing_link_is_detected() {
        assert_eq!(PageLinkProvider::extract("<html><body>nothing here</body></html>"), None);
    }
}
