//! Parsing of shell input lines.

use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};

use edubridge_app::Page;
use edubridge_app::feed::{FeedFilter, SortBy};
use edubridge_types::{PostType, ResourceCategory, Role};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,

    SignUp { email: String, password: String, role: Role },
    SignIn { email: String, password: String },
    Google,
    Resend,
    SignOut,
    /// Confirm an address on the local backend.
    Confirm { email: String },
    /// Handle a landing URL query such as `?verified=true`.
    Land(String),
    Go(Page),

    Feed,
    Filter(FeedFilter),
    Sort(SortBy),
    Search(String),
    Post(Draft),
    Attach(PathBuf),
    Like(usize),
    Comments(usize),
    Comment { index: usize, text: String },
    Edit { index: usize, text: String },
    Delete(usize),
    Claim(usize),
    Share(usize),
    Report(usize),
    MessageAuthor(usize),

    Open(usize),
    Send(String),
    Read(usize),
    Wish { category: ResourceCategory, description: String },
    Unwish(usize),
    Verify(PathBuf),
}

/// Composer contents typed on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub post_type: PostType,
    pub category: Option<ResourceCategory>,
    pub title: String,
    pub contact: String,
    pub content: String,
}

pub const HELP: &str = "\
account   signup <email> <password> [student|donor] | signin <email> <password>
          google | resend | signout | confirm <email> | land <query>
pages     go <feed|profile|privacy|terms|verification|messages|notifications|wishlist>
feed      feed | filter <all|wisdom|donation|seeking> | sort <recent|likes|comments>
          search [text] | attach <image> | post <text>
          donate <category> <title> | <contact> [| <details>]
          seek <category> <title> [| <details>]
posts     like|comments|delete|claim|share|report|dm <n>
          comment <n> <text> | edit <n> <text>
messages  open <n> | send <text>
other     read <n> | wish <category> <description> | unwish <n> | verify <file>
          help | quit";

fn index(arg: Option<&str>) -> anyhow::Result<usize> {
    let raw = arg.ok_or_else(|| anyhow!("missing item number"))?;
    let n: usize = raw
        .parse()
        .with_context(|| format!("'{}' is not an item number", raw))?;
    if n == 0 {
        bail!("item numbers start at 1");
    }
    Ok(n)
}

fn required(rest: &str, what: &str) -> anyhow::Result<String> {
    let rest = rest.trim();
    if rest.is_empty() {
        bail!("missing {}", what);
    }
    Ok(rest.to_string())
}

/// `<n> <text>`
fn index_and_text(rest: &str) -> anyhow::Result<(usize, String)> {
    let (n, text) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
    Ok((index(Some(n))?, required(text, "text")?))
}

/// `<category> <title> [| <second> [| <third>]]`
fn resource_draft(post_type: PostType, rest: &str) -> anyhow::Result<Draft> {
    let (category, rest) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
    let category: ResourceCategory = category.parse()?;
    let mut parts = rest.split('|').map(str::trim);
    let title = parts.next().unwrap_or_default().to_string();

    let (contact, content) = match post_type {
        PostType::Donation => (
            parts.next().unwrap_or_default().to_string(),
            parts.next().unwrap_or_default().to_string(),
        ),
        _ => (String::new(), parts.next().unwrap_or_default().to_string()),
    };
    Ok(Draft {
        post_type,
        category: Some(category),
        title,
        contact,
        content,
    })
}

fn page(name: &str) -> anyhow::Result<Page> {
    let page = match name {
        "feed" => Page::Feed { post: None },
        "profile" => Page::Profile,
        "privacy" => Page::Privacy,
        "terms" => Page::Terms,
        "verification" => Page::Verification,
        "messages" => Page::Messages { recipient: None },
        "notifications" => Page::Notifications,
        "wishlist" => Page::Wishlist,
        other => bail!("unknown page '{}'", other),
    };
    Ok(page)
}

pub fn parse(line: &str) -> anyhow::Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let mut args = rest.split_whitespace();

    let command = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,

        "signup" => Command::SignUp {
            email: args.next().ok_or_else(|| anyhow!("missing email"))?.to_string(),
            password: args.next().ok_or_else(|| anyhow!("missing password"))?.to_string(),
            role: args.next().map(str::parse::<Role>).transpose()?.unwrap_or(Role::Student),
        },
        "signin" => Command::SignIn {
            email: args.next().ok_or_else(|| anyhow!("missing email"))?.to_string(),
            password: args.next().ok_or_else(|| anyhow!("missing password"))?.to_string(),
        },
        "google" => Command::Google,
        "resend" => Command::Resend,
        "signout" => Command::SignOut,
        "confirm" => Command::Confirm {
            email: required(rest, "email")?,
        },
        "land" => Command::Land(required(rest, "query")?),
        "go" => Command::Go(page(&required(rest, "page")?)?),

        "feed" => Command::Feed,
        "filter" => Command::Filter(required(rest, "filter")?.parse()?),
        "sort" => Command::Sort(required(rest, "sort order")?.parse()?),
        "search" => Command::Search(rest.trim().to_string()),
        "post" => Command::Post(Draft {
            post_type: PostType::Wisdom,
            category: None,
            title: String::new(),
            contact: String::new(),
            content: required(rest, "text")?,
        }),
        "donate" => Command::Post(resource_draft(PostType::Donation, rest)?),
        "seek" => Command::Post(resource_draft(PostType::Seeking, rest)?),
        "attach" => Command::Attach(PathBuf::from(required(rest, "file")?)),

        "like" => Command::Like(index(args.next())?),
        "comments" => Command::Comments(index(args.next())?),
        "comment" => {
            let (index, text) = index_and_text(rest)?;
            Command::Comment { index, text }
        }
        "edit" => {
            let (index, text) = index_and_text(rest)?;
            Command::Edit { index, text }
        }
        "delete" => Command::Delete(index(args.next())?),
        "claim" => Command::Claim(index(args.next())?),
        "share" => Command::Share(index(args.next())?),
        "report" => Command::Report(index(args.next())?),
        "dm" => Command::MessageAuthor(index(args.next())?),

        "open" => Command::Open(index(args.next())?),
        "send" => Command::Send(required(rest, "message")?),
        "read" => Command::Read(index(args.next())?),
        "wish" => {
            let (category, description) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
            Command::Wish {
                category: category.parse()?,
                description: description.trim().to_string(),
            }
        }
        "unwish" => Command::Unwish(index(args.next())?),
        "verify" => Command::Verify(PathBuf::from(required(rest, "file")?)),

        "" => bail!("empty command"),
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(command)
}
