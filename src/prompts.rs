// src/prompts.rs
//! Prompt templates for every model call in the pipeline. Kept in one place
//! so the wording can be reviewed and tuned without touching pipeline logic.

pub const DEDUP_SYSTEM: &str = "You detect duplicate news posts. Different posts often describe \
the same underlying event with different wording. Respond with JSON only, no commentary.";

pub fn dedup_user(count: usize, news_list: &str) -> String {
    format!(
        "Below are {count} news posts, each labeled with its index. Identify groups of posts \
that report the same underlying event. Reply with a JSON object of the form \
{{\"groups\": [[0, 3], [5, 7, 9]]}} where each inner array lists the indices of one duplicate \
group, most informative post first. Posts that have no duplicate must not appear in any group.\n\n\
{news_list}"
    )
}

pub const RATE_SYSTEM: &str = "You rate news posts for a tech/science digest. Judge quality, \
relevance and importance for a student and young-professional audience. Reply with JSON only: \
{\"score\": <0.0-1.0>, \"reasoning\": \"<one short sentence>\"}.";

pub fn rate_user(content: &str) -> String {
    format!("Rate this news post:\n\n{content}")
}

pub const RATE_BATCH_SYSTEM: &str = "You rate news posts for a tech/science digest. Judge \
quality, relevance and importance for a student and young-professional audience. Reply with a \
JSON array only, one object per input post, in the same order: \
[{\"score\": <0.0-1.0>, \"reasoning\": \"<one short sentence>\"}, ...].";

pub fn rate_batch_user(numbered_items: &str) -> String {
    format!("Rate each of the following posts:\n\n{numbered_items}")
}

pub fn moderate_user(text: &str) -> String {
    format!(
        "Analyze the following text for content-policy violations and report per-category \
severity scores via the content_moderation function:\n\n{text}"
    )
}

pub const SUMMARIZE_SYSTEM: &str = "You are an experienced news editor who selects the most \
important items and groups them by theme.";

pub fn summarize_user(news_list: &str) -> String {
    format!(
        "Create a concise Markdown news digest for a channel audience. Group the news into \
3-5 themes. For each theme:\n\n\
1. **Header**: 2-3 emoji + theme name in bold\n\
2. **Entries**: 2-4 bullets of the form:\n\
   - short description [source](link)\n\n\
Requirements:\n\
- only the most important news\n\
- wording as short as possible\n\
- links in Markdown form: [text](url), using the t.me link given after each post\n\
- blank line between themes\n\
- no numbering, dates or filler\n\n\
News to process:\n\n{news_list}"
    )
}

pub fn summarize_feedback(feedback: &str) -> String {
    format!(
        "A reviewer asked for changes to your previous draft. Produce a new version of the \
digest that addresses the following feedback:\n\n{feedback}"
    )
}

pub const WEB_NEWS_SYSTEM: &str = "You are a professional news editor. Respond with valid \
JSON only, no commentary and no code fences.";

pub fn web_news_user(news_list: &str) -> String {
    format!(
        "Build a structured JSON news feed for a web page from the posts below. Reply with a \
JSON object of the form:\n\
{{\"categories\": [{{\"title\": \"...\", \"emoji\": \"🎓\", \"news\": [{{\"title\": \"...\", \
\"summary\": \"2-3 sentences\", \"source\": \"channel name\", \"url\": \"t.me/channel/id\", \
\"image\": \"\", \"time_ago\": \"2 hours ago\", \"category\": \"...\"}}]}}]}}\n\n\
Requirements:\n\
- 3-5 categories (for example Education, Science, Technology, Student life, Career)\n\
- 3-5 entries per category, headlines under 100 chars\n\
- sources are the real channel names, urls the t.me link given with each post\n\n\
Posts to process:\n\n{news_list}"
    )
}

pub const FORMAT_SYSTEM: &str = "You restyle news digests for publication in a Telegram \
channel: light, friendly tone, short sentences, no structural changes to the content.";

pub fn format_user(summary_markdown: &str) -> String {
    format!(
        "Rewrite this digest for publication. Keep every entry and every link, adjust only \
tone and layout, and start with a one-line lead-in:\n\n{summary_markdown}"
    )
}
