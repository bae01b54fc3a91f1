use serde::Serialize;

use crate::config::DisplayOptions;
use crate::models::{
    NoticeRecord, NotificationBatch, EMOJI_ANNOUNCE, EMOJI_BELL, EMOJI_DATE, EMOJI_PINNED,
};

/// Slack refuses messages with more blocks than this.
pub const MAX_BLOCKS: usize = 50;

/// Slack's limit for header text.
const MAX_HEADER_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

impl Block {
    fn section(text: String) -> Self {
        Block::Section {
            text: TextObject::Mrkdwn { text },
        }
    }
}

/// A rendered notification: fallback text plus the block layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackMessage {
    pub text: String,
    pub blocks: Vec<Block>,
}

pub fn render(batch: &NotificationBatch, display: DisplayOptions) -> SlackMessage {
    let header: String = format!("{} {} new notices", EMOJI_ANNOUNCE, batch.site_name)
        .chars()
        .take(MAX_HEADER_CHARS)
        .collect();

    // (block, is a record line)
    let mut blocks = vec![(
        Block::Header {
            text: TextObject::PlainText { text: header },
        },
        false,
    )];

    for group in &batch.groups {
        if !group.label.is_empty() {
            blocks.push((Block::section(format!("*{}*", escape(&group.label))), false));
        }
        for record in &group.records {
            blocks.push((Block::section(record_line(record, display)), true));
        }
    }

    if blocks.len() > MAX_BLOCKS {
        let overflow = blocks.split_off(MAX_BLOCKS - 1);
        let hidden = overflow.iter().filter(|(_, is_record)| *is_record).count();
        blocks.push((
            Block::Context {
                elements: vec![TextObject::Mrkdwn {
                    text: format!("…and {hidden} more"),
                }],
            },
            false,
        ));
    }

    SlackMessage {
        text: format!("{} *{}* has new notices!", EMOJI_BELL, batch.site_name),
        blocks: blocks.into_iter().map(|(block, _)| block).collect(),
    }
}

fn record_line(record: &NoticeRecord, display: DisplayOptions) -> String {
    let title = if record.is_pinned {
        format!("{} {}", EMOJI_PINNED, escape(&record.title))
    } else {
        escape(&record.title)
    };

    let mut line = if record.link.is_empty() {
        format!("• {title}")
    } else {
        format!("• <{}|{}>", escape_url(&record.link), title)
    };

    let mut meta = Vec::new();
    if display.show_date && !record.date.is_empty() {
        meta.push(format!("{} {}", EMOJI_DATE, escape(&record.date)));
    }
    if display.show_views && !record.view_count.is_empty() {
        meta.push(format!("Views {}", record.view_count));
    }
    if !meta.is_empty() {
        line.push_str("\n   ");
        line.push_str(&meta.join("   "));
    }

    line
}

/// Escape the three characters Slack treats as control sequences.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_url(url: &str) -> String {
    url.replace('<', "%3C").replace('>', "%3E").replace('|', "%7C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryGrouping;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(title: &str, category: &str, pinned: bool) -> NoticeRecord {
        NoticeRecord::new(
            title,
            format!("https://example.com/view?no={}", title.len()),
            "2025.09.09",
            "178",
            category,
            pinned,
        )
    }

    fn batch(records: Vec<NoticeRecord>) -> NotificationBatch {
        let grouping = CategoryGrouping {
            priority: vec!["장학".into(), "기타".into()],
            empty_label: None,
        };
        NotificationBatch::new("일반대학원", records, &grouping)
    }

    fn texts(message: &SlackMessage) -> Vec<String> {
        message
            .blocks
            .iter()
            .map(|b| match b {
                Block::Header { text } | Block::Section { text } => match text {
                    TextObject::PlainText { text } | TextObject::Mrkdwn { text } => text.clone(),
                },
                Block::Context { elements } => format!("{elements:?}"),
            })
            .collect()
    }

    fn line(title: &str, marker: &str) -> String {
        format!(
            "• <https://example.com/view?no={}|{}{}>\n   📅 2025.09.09   Views 178",
            title.len(),
            marker,
            title
        )
    }

    #[test]
    fn renders_header_labels_and_lines() {
        let records = vec![
            record("기타 공지", "기타", false),
            record("근로장학생 모집", "장학", true),
            record("언어교환", "", false),
        ];
        let message = render(&batch(records), DisplayOptions::default());

        assert_eq!(message.text, "🔔 *일반대학원* has new notices!");
        assert_eq!(
            texts(&message),
            vec![
                "📢 일반대학원 new notices".to_string(),
                "*장학*".to_string(),
                line("근로장학생 모집", "🌟 "),
                "*기타*".to_string(),
                line("기타 공지", ""),
                line("언어교환", ""),
            ]
        );
    }

    #[test]
    fn display_flags_toggle_metadata() {
        let b = batch(vec![record("a", "", false)]);

        let only_views = render(&b, DisplayOptions { show_date: false, show_views: true });
        assert!(texts(&only_views)[1].ends_with("\n   Views 178"));

        let none = render(&b, DisplayOptions { show_date: false, show_views: false });
        assert!(!texts(&none)[1].contains('\n'));
    }

    #[test]
    fn empty_metadata_omits_line() {
        let r = NoticeRecord::new("t", "https://example.com/t", "", "", "", false);
        let message = render(&batch(vec![r]), DisplayOptions::default());
        assert_eq!(texts(&message)[1], "• <https://example.com/t|t>");
    }

    #[test]
    fn escapes_control_characters() {
        let r = NoticeRecord::new("R&D <BK21> 안내", "", "", "", "", false);
        let message = render(&batch(vec![r]), DisplayOptions::default());
        assert_eq!(texts(&message)[1], "• R&amp;D &lt;BK21&gt; 안내");
    }

    #[test]
    fn serializes_to_slack_block_json() {
        let message = render(&batch(vec![record("a", "장학", false)]), DisplayOptions::default());
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(
            value["blocks"][0],
            json!({"type": "header", "text": {"type": "plain_text", "text": "📢 일반대학원 new notices"}})
        );
        assert_eq!(value["blocks"][1]["type"], "section");
        assert_eq!(value["blocks"][1]["text"]["type"], "mrkdwn");
    }

    #[test]
    fn caps_block_count() {
        let records: Vec<_> = (0..60)
            .map(|i| {
                let link = format!("https://example.com/{i}");
                NoticeRecord::new(format!("n{i}"), link, "", "", "", false)
            })
            .collect();
        let message = render(&batch(records), DisplayOptions::default());

        assert_eq!(message.blocks.len(), MAX_BLOCKS);
        assert_eq!(
            message.blocks.last(),
            Some(&Block::Context {
                elements: vec![TextObject::Mrkdwn { text: "…and 12 more".to_string() }]
            })
        );
    }
}
