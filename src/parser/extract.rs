//! Company and title extraction — ordered strategy chains, first match wins.
//!
//! Each field runs its own chain of `(name, strategy)` pairs evaluated in a
//! loop with early return, so the tie-break order stays auditable and each
//! rule is unit-testable on its own. A strategy returns a raw candidate; the
//! acceptance filter normalizes it and rejects trivia (too short, stop words,
//! lone capitalized nouns). When every strategy fails the sentinel is
//! returned, never null/empty.

use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::parser::title_case_words;

/// Sentinel meaning company extraction failed.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
/// Sentinel meaning title extraction failed.
pub const UNKNOWN_POSITION: &str = "Unknown Position";

/// Result of running both extraction chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub company: String,
    pub title: String,
}

impl Extraction {
    pub fn company_known(&self) -> bool {
        self.company != UNKNOWN_COMPANY
    }

    pub fn title_known(&self) -> bool {
        self.title != UNKNOWN_POSITION
    }
}

/// Extract company and title from a message. Never fails.
pub fn extract(sender: &str, subject: &str, body: &str) -> Extraction {
    let ctx = Context {
        sender,
        subject,
        content: format!("{subject} {body}"),
    };
    Extraction {
        company: extract_company(&ctx),
        title: extract_title(&ctx),
    }
}

/// Shared view of one message for the strategy functions.
struct Context<'a> {
    sender: &'a str,
    subject: &'a str,
    /// Subject and body concatenated — the widest search surface.
    content: String,
}

type Strategy = for<'a> fn(&Context<'a>) -> Option<String>;

// ── Word lists ──────────────────────────────────────────────────────

/// Free-mail domains that never identify an employer.
const FREE_MAIL_LABELS: &[&str] = &[
    "gmail",
    "googlemail",
    "yahoo",
    "hotmail",
    "outlook",
    "live",
    "icloud",
    "aol",
    "mail",
    "proton",
    "protonmail",
    "gmx",
];

/// Mail-infrastructure labels skipped when reading a company off a domain.
const DOMAIN_SKIP_LABELS: &[&str] = &[
    "mail",
    "smtp",
    "email",
    "careers",
    "jobs",
    "hr",
    "recruiting",
    "noreply",
    "no-reply",
];

/// Words that are never a company on their own.
const COMPANY_STOP_WORDS: &[&str] = &[
    "the",
    "you",
    "your",
    "our",
    "their",
    "this",
    "that",
    "new",
    "all",
    "team",
    "job",
    "jobs",
    "and",
    "for",
    "with",
    "from",
    "thank",
    "thanks",
    "hello",
    "dear",
    "regarding",
    "interview",
    "application",
    "offer",
    "rejection",
    "update",
    "invitation",
    "congratulations",
    "opportunity",
    "position",
    "role",
    "opening",
];

/// Organizational suffixes stripped from a captured company phrase.
const COMPANY_TAIL_WORDS: &[&str] =
    &["team", "recruiting", "careers", "jobs", "hr", "hiring", "talent"];

/// Words that mark the start of a job-title phrase — used to stop the
/// leading-company capture.
const JOB_KEYWORDS: &[&str] = &[
    "software",
    "senior",
    "junior",
    "staff",
    "principal",
    "lead",
    "associate",
    "graduate",
    "data",
    "product",
    "machine",
    "frontend",
    "backend",
    "full",
    "devops",
    "sre",
    "cloud",
    "security",
    "mobile",
    "web",
    "platform",
    "ux",
    "qa",
    "engineer",
    "engineering",
    "developer",
    "manager",
    "scientist",
    "designer",
    "analyst",
    "consultant",
    "architect",
    "programmer",
    "intern",
    "internship",
    "position",
    "role",
    "opening",
    "opportunity",
];

/// Core title nouns — a single-word candidate is only a title if it is one
/// of these ("Developer" yes, "Google" no).
const TITLE_CORE_WORDS: &[&str] = &[
    "engineer",
    "developer",
    "programmer",
    "scientist",
    "designer",
    "analyst",
    "consultant",
    "architect",
    "manager",
    "intern",
    "internship",
    "sre",
    "devops",
];

/// Filler dropped from the front of a title candidate ("Your application for …").
const TITLE_FILLER_WORDS: &[&str] = &[
    "your",
    "my",
    "our",
    "the",
    "a",
    "an",
    "this",
    "that",
    "you",
    "we",
    "re",
    "fwd",
    "regarding",
    "for",
    "to",
    "at",
    "with",
    "about",
    "application",
    "applications",
    "applying",
    "thank",
    "thanks",
    "position",
    "role",
    "job",
    "opportunity",
    "opening",
    "interview",
    "invitation",
    "update",
    "received",
    "confirmation",
    "next",
    "steps",
];

/// Lifecycle words trimmed from the tail of a title candidate
/// ("Software Engineer Interview" → "Software Engineer").
const TITLE_TAIL_WORDS: &[&str] = &[
    "interview",
    "interviews",
    "application",
    "applications",
    "applying",
    "received",
    "submitted",
    "invitation",
    "invite",
    "confirmation",
    "update",
    "offer",
    "rejection",
    "position",
    "opportunity",
    "opening",
];

// ── Compiled patterns ───────────────────────────────────────────────

fn known_company_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(google|amazon|microsoft|meta|facebook|apple|netflix|tesla|uber|lyft|airbnb|stripe|spotify|twitter|linkedin|salesforce|oracle|adobe|nvidia|intel|ibm|cisco|paypal|ebay|snap|pinterest)\b",
        )
        .unwrap()
    })
}

/// "from/at/with/for/to <Capitalized Phrase>". The phrase is a maximal run of
/// capitalized words on one line; trailing org noise is stripped afterwards.
fn preposition_company_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:[Ff]rom|[Aa]t|[Ww]ith|[Ff]or|[Tt]o)[ \t]+([A-Z][A-Za-z0-9.&]*(?:[ \t]+[A-Z][A-Za-z0-9.&]*)*)",
        )
        .unwrap()
    })
}

/// Known job-title shapes: optional seniority, domain modifiers, core noun.
fn keyword_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:senior|junior|staff|principal|lead|associate|graduate)[ \t]+)?(?:(?:software|data|product|machine[ \t]+learning|frontend|front[ -]end|backend|back[ -]end|full[ -]stack|devops|site[ \t]+reliability|cloud|security|mobile|web|platform|ui/ux|ux|qa)[ \t]+)*(?:engineer(?:ing)?|developer|programmer|scientist|designer|analyst|consultant|architect|manager|intern(?:ship)?|sre)\b",
        )
        .unwrap()
    })
}

/// "position/role/job: <Title>" label form.
fn labeled_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:position|role|job|opening|opportunity)[ \t]*[:\-][ \t]*([A-Za-z][A-Za-z /+#&-]*)")
            .unwrap()
    })
}

/// "<Title> at <Company>" — the capture is cleaned of leading filler.
fn title_at_company_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z][A-Za-z0-9/+#&-]*(?:[ \t]+[A-Za-z0-9/+#&-]+)*?)[ \t]+at[ \t]+[A-Z]")
            .unwrap()
    })
}

fn sender_address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^>]+)>").unwrap())
}

// ── Company chain ───────────────────────────────────────────────────

const COMPANY_STRATEGIES: &[(&str, Strategy)] = &[
    ("known-company/subject", known_company_in_subject),
    ("preposition/subject", preposition_company_in_subject),
    ("leading-phrase/subject", leading_company_before_keyword),
    ("leading-word/subject", leading_capitalized_word),
    ("sender-domain", sender_domain_company),
    ("preposition/content", preposition_company_in_content),
    ("known-company/content", known_company_in_content),
];

fn extract_company(ctx: &Context) -> String {
    for (name, strategy) in COMPANY_STRATEGIES {
        if let Some(raw) = strategy(ctx)
            && let Some(company) = accept_company(&raw)
        {
            trace!(strategy = name, company = %company, "Company extracted");
            return company;
        }
    }
    UNKNOWN_COMPANY.to_string()
}

fn known_company_in_subject(ctx: &Context) -> Option<String> {
    known_company_re()
        .find(ctx.subject)
        .map(|m| m.as_str().to_string())
}

fn preposition_company_in_subject(ctx: &Context) -> Option<String> {
    preposition_company_re()
        .captures(ctx.subject)
        .map(|c| c[1].to_string())
}

/// Leading capitalized phrase cut off by a job keyword, e.g.
/// "Initech Software Engineer - Application Received" → "Initech".
fn leading_company_before_keyword(ctx: &Context) -> Option<String> {
    let mut collected: Vec<&str> = Vec::new();
    for word in ctx.subject.split_whitespace().take(6) {
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        if bare.is_empty() {
            break;
        }
        if JOB_KEYWORDS.contains(&bare.to_lowercase().as_str()) {
            return (!collected.is_empty()).then(|| collected.join(" "));
        }
        if !bare.chars().next().is_some_and(|c| c.is_uppercase()) {
            break;
        }
        collected.push(bare);
    }
    // Never reached a job keyword — not this strategy's shape.
    None
}

fn leading_capitalized_word(ctx: &Context) -> Option<String> {
    let first = ctx.subject.split_whitespace().next()?;
    let bare = first.trim_matches(|c: char| !c.is_alphanumeric());
    (bare.chars().next().is_some_and(|c| c.is_uppercase())).then(|| bare.to_string())
}

/// Company from the sender's email domain, excluding free-mail providers and
/// mail-infrastructure labels ("hr@google.com" → "Google").
fn sender_domain_company(ctx: &Context) -> Option<String> {
    let address = sender_address_re()
        .captures(ctx.sender)
        .map(|c| c[1].to_string())
        .or_else(|| ctx.sender.contains('@').then(|| ctx.sender.trim().to_string()))?;
    let domain = address.rsplit('@').next()?.to_lowercase();
    let label = domain
        .split('.')
        .find(|label| !label.is_empty() && !DOMAIN_SKIP_LABELS.contains(label))?;
    if FREE_MAIL_LABELS.contains(&label) {
        return None;
    }
    Some(label.to_string())
}

fn preposition_company_in_content(ctx: &Context) -> Option<String> {
    preposition_company_re()
        .captures(&ctx.content)
        .map(|c| c[1].to_string())
}

fn known_company_in_content(ctx: &Context) -> Option<String> {
    known_company_re()
        .find(&ctx.content)
        .map(|m| m.as_str().to_string())
}

/// Normalize a company candidate and reject trivia.
fn accept_company(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while let Some(last) = words.last() {
        if COMPANY_TAIL_WORDS.contains(&last.to_lowercase().as_str()) {
            words.pop();
        } else {
            break;
        }
    }
    let cleaned = words.join(" ");
    if cleaned.len() <= 2 || COMPANY_STOP_WORDS.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }
    Some(title_case_words(&cleaned))
}

// ── Title chain ─────────────────────────────────────────────────────

const TITLE_STRATEGIES: &[(&str, Strategy)] = &[
    ("company-title/subject", leading_company_title),
    ("title-at-company/subject", title_at_company),
    ("keyword/subject", keyword_title_in_subject),
    ("keyword/content", keyword_title_in_content),
    ("labeled/content", labeled_title_in_content),
];

fn extract_title(ctx: &Context) -> String {
    for (name, strategy) in TITLE_STRATEGIES {
        if let Some(raw) = strategy(ctx)
            && let Some(title) = accept_title(&raw)
        {
            trace!(strategy = name, title = %title, "Title extracted");
            return title;
        }
    }
    UNKNOWN_POSITION.to_string()
}

/// "<Company> <Title phrase>" anchored at the subject start, e.g.
/// "Google Software Engineer - Application Received" → "Software Engineer".
fn leading_company_title(ctx: &Context) -> Option<String> {
    let head = ctx
        .subject
        .split(|c: char| "-–—:|".contains(c))
        .next()
        .unwrap_or("");
    let words: Vec<&str> = head.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    if !words
        .iter()
        .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
    {
        return None;
    }
    Some(words[1..].join(" "))
}

fn title_at_company(ctx: &Context) -> Option<String> {
    title_at_company_re()
        .captures(ctx.subject)
        .map(|c| c[1].to_string())
}

fn keyword_title_in_subject(ctx: &Context) -> Option<String> {
    keyword_title_re()
        .find(ctx.subject)
        .map(|m| m.as_str().to_string())
}

fn keyword_title_in_content(ctx: &Context) -> Option<String> {
    keyword_title_re()
        .find(&ctx.content)
        .map(|m| m.as_str().to_string())
}

fn labeled_title_in_content(ctx: &Context) -> Option<String> {
    let raw = labeled_title_re().captures(&ctx.content).map(|c| c[1].to_string())?;
    // The capture runs to the end of the phrase — cut at a following
    // "at <Company>" / "with <Company>" clause.
    static CUT: OnceLock<Regex> = OnceLock::new();
    let cut = CUT.get_or_init(|| Regex::new(r"(?i)\s+(?:at|with)\s.*$").unwrap());
    Some(cut.replace(&raw, "").into_owned())
}

/// Normalize a title candidate and reject trivia.
fn accept_title(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while let Some(first) = words.first() {
        if TITLE_FILLER_WORDS.contains(&first.to_lowercase().as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = words.last() {
        if TITLE_TAIL_WORDS.contains(&last.to_lowercase().as_str()) {
            words.pop();
        } else {
            break;
        }
    }
    let cleaned = words.join(" ");
    if cleaned.len() <= 3 {
        return None;
    }
    if words.len() == 1 && !TITLE_CORE_WORDS.contains(&words[0].to_lowercase().as_str()) {
        return None;
    }
    Some(title_case_words(&cleaned))
}
