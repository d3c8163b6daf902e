//! Text forecast download and plausibility checks

use scraper::{Html, Node};
use thiserror::Error;
use tracing::{debug, info};

use crate::{config::TextForecastConfig, errors::WeatherError};

/// Reasons a freshly downloaded text is not stored
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRejection {
    #[error("text is empty")]
    Empty,
    #[error("text contains a single quote")]
    ContainsQuote,
    #[error("text equals the latest stored text")]
    Unchanged,
}

/// HTTP client for the text forecast page
pub struct TextForecastClient {
    client: reqwest::Client,
    url: String,
}

impl TextForecastClient {
    pub fn new(config: &TextForecastConfig) -> Result<Self, WeatherError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Download the page and reduce it to plain text
    pub async fn fetch(&self) -> Result<String, WeatherError> {
        info!("Downloading text forecast from {}", self.url);
        let html = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("Received {} bytes of HTML", html.len());

        Ok(html_to_text(&html))
    }
}

/// Strip markup and collapse whitespace.
///
/// Text inside `script` and `style` elements is dropped.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style"))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// Decide whether `text` may be written, given the latest stored text.
pub fn check_text(text: &str, latest: Option<&str>) -> Result<(), TextRejection> {
    if text.trim().is_empty() {
        return Err(TextRejection::Empty);
    }
    if text.contains('\'') {
        return Err(TextRejection::ContainsQuote);
    }
    if latest == Some(text) {
        return Err(TextRejection::Unchanged);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_whitespace() {
        let html = r#"<html>
            <head><title>VHDL50 DWMG</title><style>p { color: red; }</style></head>
            <body>
                <h1>Wetterlage</h1>
                <p>Ein Tief   zieht
                   über <b>Bayern</b>.</p>
                <script>var tracking = 1;</script>
                <pre>Heute: Regen</pre>
            </body>
        </html>"#;

        assert_eq!(
            html_to_text(html),
            "VHDL50 DWMG Wetterlage Ein Tief zieht über Bayern . Heute: Regen"
        );
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(html_to_text("<p>S&uuml;d &amp; Ost</p>"), "Süd & Ost");
    }

    #[test]
    fn empty_page() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(check_text("", None), Err(TextRejection::Empty));
        assert_eq!(check_text("  ", Some("old")), Err(TextRejection::Empty));
    }

    #[test]
    fn rejects_quotes() {
        assert_eq!(
            check_text("it's raining", None),
            Err(TextRejection::ContainsQuote)
        );
    }

    #[test]
    fn rejects_unchanged_text() {
        assert_eq!(
            check_text("Heute Regen", Some("Heute Regen")),
            Err(TextRejection::Unchanged)
        );
    }

    #[test]
    fn accepts_new_text() {
        assert_eq!(check_text("Heute Regen", Some("Gestern Sonne")), Ok(()));
        assert_eq!(check_text("Heute Regen", None), Ok(()));
    }
}
