use std::{borrow::Cow, sync::LazyLock};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use regex::Regex;
use tracing::debug;

use crate::models::{
    catalog::NotificationTypeCatalog,
    event::{MailHeader, NotificationBody, NotificationHeader},
    mail::RenderedEmail,
};

static FONT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?font\b[^>]*>").expect("font tag pattern is valid"));

/// Removes opening and closing `<font>` tags, leaving all other markup.
pub fn strip_font_tags(html: &str) -> Cow<'_, str> {
    FONT_TAG.replace_all(html, "")
}

/// A rendered notification plus a note when its type had no description.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNotification {
    pub email: RenderedEmail,
    pub catalog_miss: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    offset: FixedOffset,
}

impl Formatter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn render_mail(&self, header: &MailHeader, body: &str, sender: &str) -> RenderedEmail {
        debug!(event_id = header.id, "Rendering mail");

        RenderedEmail {
            subject: format!("[EVEMail] {}", header.title),
            html: format!(
                "{}{}",
                self.byline(sender, header.timestamp),
                strip_font_tags(body)
            ),
        }
    }

    pub fn render_notification(
        &self,
        header: &NotificationHeader,
        body: &NotificationBody,
        sender: &str,
        catalog: &NotificationTypeCatalog,
    ) -> RenderedNotification {
        debug!(event_id = header.id, type_id = header.type_id, "Rendering notification");

        let (subject, catalog_miss) = match catalog.describe(header.type_id) {
            Some(description) => (format!("[EVE Notify] {}", description), None),
            None => (
                format!("[EVE Notify] Notification type {}", header.type_id),
                Some(format!(
                    "No catalog description for notification type {}",
                    header.type_id
                )),
            ),
        };

        let alliance = body
            .aggressor_alliance_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());

        let sentence = format!(
            "Attack by {} <{}> [{}] against {} located at moon {} in system {}. \
             Health is {}/{}/{}.",
            body.aggressor_id,
            body.aggressor_corp_id,
            alliance,
            body.type_id,
            body.moon_id,
            body.solar_system_id,
            body.shield_value,
            body.armor_value,
            body.hull_value,
        );

        RenderedNotification {
            email: RenderedEmail {
                subject,
                html: format!("{}{}", self.byline(sender, header.timestamp), sentence),
            },
            catalog_miss,
        }
    }

    pub fn byline(&self, sender: &str, timestamp: i64) -> String {
        format!("<p>Sent by {} at {}</p>", sender, self.render_time(timestamp))
    }

    /// `YYYY-MM-DD HH:MM:SS EVE Time` in UTC, otherwise suffixed with the
    /// configured offset.
    pub fn render_time(&self, timestamp: i64) -> String {
        let Some(utc) = DateTime::from_timestamp(timestamp, 0) else {
            return format!("@{}", timestamp);
        };

        let local = utc.with_timezone(&self.offset);

        if self.offset.local_minus_utc() == 0 {
            format!("{} EVE Time", local.format("%Y-%m-%d %H:%M:%S"))
        } else {
            local.format("%Y-%m-%d %H:%M:%S %:z").to_string()
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}
