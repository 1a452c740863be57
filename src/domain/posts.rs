use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

const WORDS_PER_MINUTE: usize = 200;

/// Cover image as delivered by the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRef {
    pub name: String,
    pub image: Option<String>,
}

impl AuthorRef {
    /// First character of the name, used when no portrait is available.
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLabel {
    pub title: String,
}

/// One listable post. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub published_at: OffsetDateTime,
    pub main_image: Option<ImageRef>,
    pub author: Option<AuthorRef>,
    pub categories: Option<Vec<CategoryLabel>>,
}

impl PostSummary {
    pub fn categories(&self) -> &[CategoryLabel] {
        self.categories.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Paragraph,
    Heading(u8),
    Quote,
    BulletItem,
    NumberItem,
}

/// Inline formatting on a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanMarks {
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
}

/// A run of text sharing the same marks, optionally inside a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub marks: SpanMarks,
    pub link: Option<String>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: SpanMarks::default(),
            link: None,
        }
    }
}

pub fn plain_text(spans: &[TextSpan]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyBlock {
    Text {
        style: BlockStyle,
        spans: Vec<TextSpan>,
    },
    Image {
        url: String,
        alt: Option<String>,
        caption: Option<String>,
    },
}

/// A post with its body, as shown on the post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub summary: PostSummary,
    pub body: Vec<BodyBlock>,
}

impl PostDetail {
    pub fn word_count(&self) -> usize {
        self.body
            .iter()
            .map(|block| match block {
                BodyBlock::Text { spans, .. } => plain_text(spans).split_whitespace().count(),
                BodyBlock::Image { .. } => 0,
            })
            .sum()
    }

    pub fn reading_time_minutes(&self) -> usize {
        self.word_count().div_ceil(WORDS_PER_MINUTE)
    }
}

pub fn format_human_date(value: OffsetDateTime) -> String {
    value
        .date()
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}
