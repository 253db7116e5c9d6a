pub const TRACK_PRODUCT: &str = "/trackproduct";
pub const LIST_PRODUCTS: &str = "/listproducts";
pub const CANCEL: &str = "/cancel";
pub const HELP: &str = "/help";
pub const YES: &str = "/yes";
pub const NO: &str = "/no";

pub const PAGE_PREFIX: &str = "/page_";
pub const DELETE_PREFIX: &str = "/del_";

const HELP_WORDS: &[&str] = &[
    HELP, "help", "helb", "хелп", "хелб", "/commands", "commands", "команды", "sos", "/помощь", "помощь", "помогите",
];

const WELCOME_WORDS: &[&str] = &[
    "/start", "/hi", "hi", "/hello", "hello", "привет", "прив", "хай", "дороу", "дратути",
];

/// Parsed user input. Anything unrecognised is kept as `Text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TrackProduct,
    ListProducts,
    Cancel,
    Help,
    Welcome,
    Yes,
    No,
    Page(u32),
    Delete(String),
    Text(String),
}

impl Command {
    pub fn parse(input: &str) -> Command {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();

        match lowered.as_str() {
            TRACK_PRODUCT => return Command::TrackProduct,
            LIST_PRODUCTS => return Command::ListProducts,
            CANCEL => return Command::Cancel,
            YES => return Command::Yes,
            NO => return Command::No,
            word if HELP_WORDS.contains(&word) => return Command::Help,
            word if WELCOME_WORDS.contains(&word) => return Command::Welcome,
            _ => {}
        }

        if let Some(page) = lowered.strip_prefix(PAGE_PREFIX).and_then(|p| p.parse::<u32>().ok()) {
            if page > 0 {
                return Command::Page(page);
            }
        }

        // Slugs are case-sensitive
        if let Some(slug) = trimmed.strip_prefix(DELETE_PREFIX) {
            return Command::Delete(slug.trim().to_string());
        }

        Command::Text(trimmed.to_string())
    }
}

pub fn page_payload(page: u32) -> String {
    format!("{}{}", PAGE_PREFIX, page)
}

pub fn delete_payload(slug: &str) -> String {
    format!("{}{}", DELETE_PREFIX, slug)
}
