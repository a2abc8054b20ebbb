mod api;
mod auth;
mod bookmark;
mod config;
mod db;
mod fetcher;
mod filter;
mod logging;
mod models;
mod profile;
mod session;
mod tui;
mod validate;

use anyhow::{anyhow, bail, Context, Result};
use api::{Api, HttpApi};
use auth::SignupForm;
use bookmark::{BookmarkController, BookmarkOutcome};
use clap::{ArgAction, Parser, Subcommand};
use config::Config;
use db::Database;
use fetcher::{FetchStatus, ListingFetcher, ListingView};
use filter::{FilterStore, Location};
use logging::LogConfig;
use models::{ActiveFilter, DomainTag, PostDetail, PostSummary, ProfileLink, RoleCategory, RoleTag, SortOrder};
use profile::ProfileDraft;
use session::Session;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use validate::{CvFile, PasswordChecklist};

#[derive(Parser)]
#[command(name = "internhasha")]
#[command(about = "Browse internship postings, bookmark them, and manage your applicant profile")]
struct Cli {
    /// API server base URL (overrides config and INTERNHASHA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Listing query string, as shared from another session (e.g. "roles=FRONT&order=1")
    #[arg(short, long, global = true, default_value = "")]
    query: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List postings for the current filter
    Posts,

    /// Change the listing filter
    Filter {
        #[command(subcommand)]
        command: FilterCommands,
    },

    /// Interactive posting browser
    Browse,

    /// Show posting details
    Show {
        /// Posting ID
        id: String,
    },

    /// Toggle the bookmark on a posting
    Bookmark {
        /// Posting ID
        id: String,
    },

    /// List bookmarked postings
    Bookmarks,

    /// Create an applicant account
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        /// Email verification code
        #[arg(long)]
        code: Option<String>,
    },

    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Me,

    /// Manage the applicant profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    /// Show the current filter and its share query
    Show,

    /// Toggle one role (FRONT, APP, BACKEND, DATA, OTHERS, DESIGN, PLANNER, MARKETING)
    Role { role: RoleTag },

    /// Toggle a whole role group (development, planner, design, marketing)
    Category { category: RoleCategory },

    /// Toggle one business domain
    Domain { domain: DomainTag },

    /// Select every domain, or clear them if all are selected
    DomainsAll,

    /// Recruitment status (all, only)
    Active { value: ActiveFilter },

    /// Sort order (recent, deadline)
    Sort { order: SortOrder },

    /// Jump to a page (1-based)
    Page { page: u32 },

    /// Clear status, domain and sort while keeping roles
    Reset,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the applicant profile
    Show,

    /// Create or update the applicant profile
    Edit {
        /// Two-digit enrollment year (e.g. 21)
        #[arg(long)]
        year: Option<String>,

        /// Department, primary first (repeatable, replaces existing)
        #[arg(long = "department")]
        departments: Vec<String>,

        /// Path to a PDF CV
        #[arg(long)]
        cv: Option<PathBuf>,

        /// Desired position (repeatable, replaces existing)
        #[arg(long = "position")]
        positions: Vec<RoleTag>,

        /// Tech stack entry (repeatable, added to existing)
        #[arg(long = "stack")]
        stacks: Vec<String>,

        /// One-line introduction
        #[arg(long)]
        slogan: Option<String>,

        /// Longer introduction
        #[arg(long)]
        bio: Option<String>,

        /// Link as "url|description" (repeatable, replaces existing)
        #[arg(long = "link")]
        links: Vec<String>,

        /// Remove every link
        #[arg(long)]
        clear_links: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose);
    let log_config = match cli.command {
        Commands::Browse => log_config.with_log_file(logging::default_log_file()),
        _ => log_config,
    };
    logging::init_logging(&log_config).context("Failed to initialize logging")?;

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    let api = HttpApi::new(&config).map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
    let db = Database::open()?;
    let session = Session::new(&db);
    let location = Location::new(cli.query.as_str());

    match cli.command {
        Commands::Posts => {
            let store = FilterStore::mount(location, &db)?;
            let mut fetcher = ListingFetcher::new();
            if fetcher.fetch(&api, store.state(), &session).await == FetchStatus::Reload {
                println!("Your session expired. Showing postings logged out.\n");
                fetcher.fetch(&api, store.state(), &session).await;
            }
            match fetcher.view() {
                ListingView::Loaded(page) => {
                    print_posts(&page.posts);
                    println!(
                        "\nPage {} of {}  |  query: ?{}",
                        store.state().page + 1,
                        page.paginator.last_page.max(1),
                        store.location().query()
                    );
                }
                ListingView::Failed(message) => bail!("{}", message),
                _ => {}
            }
        }

        Commands::Filter { command } => {
            let mut store = FilterStore::mount(location, &db)?;
            match command {
                FilterCommands::Show => {}
                FilterCommands::Role { role } => store.toggle_role(role)?,
                FilterCommands::Category { category } => store.toggle_role_category(category)?,
                FilterCommands::Domain { domain } => store.toggle_domain(domain)?,
                FilterCommands::DomainsAll => store.toggle_all_domains()?,
                FilterCommands::Active { value } => store.set_active_only(value)?,
                FilterCommands::Sort { order } => store.set_sort_order(order)?,
                FilterCommands::Page { page } => store.set_page(page.saturating_sub(1))?,
                FilterCommands::Reset => {
                    if !store.reset_secondary_filters()? {
                        println!("Nothing to reset.");
                    }
                }
            }
            print_filter(&store);
        }

        Commands::Browse => {
            let api: Arc<dyn Api> = Arc::new(api);
            tui::run_browse(api, &db, location, &config.api_url).await?;
        }

        Commands::Show { id } => {
            let token = session.token();
            let detail = api
                .get_post(&id, token.as_deref())
                .await
                .map_err(|e| anyhow!("Could not load posting {}: {}", id, e.user_message()))?;
            print_detail(&detail, &config.api_url);
        }

        Commands::Bookmark { id } => {
            let token = session.token();
            let detail = api
                .get_post(&id, token.as_deref())
                .await
                .map_err(|e| anyhow!("Could not load posting {}: {}", id, e.user_message()))?;
            let mut post = summary_of(&detail);
            let mut controller = BookmarkController::new();
            match controller.toggle(&api, &mut post, &session).await {
                BookmarkOutcome::Updated(true) => println!("Bookmarked '{}'.", post.position_title),
                BookmarkOutcome::Updated(false) => println!("Removed bookmark from '{}'.", post.position_title),
                BookmarkOutcome::LoginRequired => {
                    println!("Log in to bookmark postings. No account yet? Run `internhasha signup`.")
                }
                BookmarkOutcome::Suppressed => {}
                BookmarkOutcome::Failed(message) => bail!("{}", message),
            }
        }

        Commands::Bookmarks => {
            let token = session
                .token()
                .ok_or_else(|| anyhow!("Please log in first."))?;
            match api.list_bookmarks(&token).await {
                Ok(posts) => print_posts(&posts),
                Err(e) if e.is_unauthorized() => {
                    session.invalidate();
                    bail!("Your session expired. Please log in again.");
                }
                Err(e) => bail!("Could not load bookmarks: {}", e.user_message()),
            }
        }

        Commands::Signup { name, email, code } => {
            let password = prompt("Password: ")?;
            let checklist = PasswordChecklist::check(&password);
            for (label, ok) in checklist.items() {
                println!("  [{}] {}", if ok { "x" } else { " " }, label);
            }
            let password_confirm = prompt("Confirm password: ")?;
            let form = SignupForm {
                name,
                email,
                password,
                password_confirm,
                success_code: code,
            };
            auth::signup(&api, &session, &form).await?;
            println!("Welcome! You are now logged in.");
        }

        Commands::Login { email } => {
            let password = prompt("Password: ")?;
            auth::login(&api, &session, &email, &password).await?;
            println!("Logged in as {}.", email.trim());
        }

        Commands::Logout => {
            auth::logout(&session);
            println!("Logged out.");
        }

        Commands::Me => {
            let user = auth::current_user(&api, &session).await?;
            println!("Name: {}", user.name);
            println!("Email: {}", user.email);
            if let Some(created) = &user.created_at {
                println!("Joined: {}", models::format_date(created));
            }
        }

        Commands::Profile { command } => match command {
            ProfileCommands::Show => match profile::load_profile(&api, &session).await? {
                Some(p) => {
                    println!("{} <{}>", p.name, p.email);
                    println!("Enrolled: {}", p.enroll_year);
                    println!("Departments: {}", p.departments().join(", "));
                    if let Some(key) = p.cv_key.as_deref().filter(|k| !k.is_empty()) {
                        println!("CV: {}", key.rsplit('/').next().unwrap_or(key));
                    }
                    if let Some(positions) = p.positions.as_ref().filter(|v| !v.is_empty()) {
                        let labels: Vec<&str> = positions.iter().map(|r| r.label()).collect();
                        println!("Positions: {}", labels.join(", "));
                    }
                    if let Some(stacks) = p.stacks.as_ref().filter(|v| !v.is_empty()) {
                        println!("Stacks: {}", stacks.join(", "));
                    }
                    if let Some(slogan) = p.slogan.as_deref().filter(|s| !s.is_empty()) {
                        println!("Slogan: {}", slogan);
                    }
                    if let Some(explanation) = p.explanation.as_deref().filter(|s| !s.is_empty()) {
                        println!("\n{}", textwrap::fill(explanation, 78));
                    }
                    for link in p.links.iter().flatten() {
                        println!("  - {} ({})", link.link, link.description);
                    }
                }
                None => println!("No profile yet. Create one with `internhasha profile edit`."),
            },

            ProfileCommands::Edit {
                year,
                departments,
                cv,
                positions,
                stacks,
                slogan,
                bio,
                links,
                clear_links,
            } => {
                let mut draft = match profile::load_profile(&api, &session).await? {
                    Some(existing) => ProfileDraft::from_profile(&existing),
                    None => ProfileDraft::default(),
                };
                if let Some(year) = year {
                    draft.enroll_year = year;
                }
                if !departments.is_empty() {
                    draft.departments = departments;
                }
                if let Some(path) = cv {
                    draft.cv_file = Some(CvFile::from_path(&path)?);
                }
                if !positions.is_empty() {
                    draft.positions = positions;
                }
                for stack in &stacks {
                    draft
                        .stacks
                        .commit(stack)
                        .with_context(|| format!("Cannot add stack '{}'", stack))?;
                }
                if let Some(slogan) = slogan {
                    draft.slogan = slogan;
                }
                if let Some(bio) = bio {
                    draft.explanation = bio;
                }
                if clear_links {
                    draft.links.clear();
                }
                if !links.is_empty() {
                    draft.links = links.iter().map(|l| parse_link(l)).collect();
                }

                let update = profile::save_profile(&api, &session, &draft).await?;
                println!("Profile saved.");
                println!("CV: {}", update.cv_key);
            }
        },
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_link(raw: &str) -> ProfileLink {
    match raw.split_once('|') {
        Some((link, description)) => ProfileLink {
            link: link.trim().to_string(),
            description: description.trim().to_string(),
        },
        None => ProfileLink {
            link: raw.trim().to_string(),
            description: String::new(),
        },
    }
}

fn summary_of(detail: &PostDetail) -> PostSummary {
    PostSummary {
        id: detail.id.clone(),
        company_name: detail.company.company_name.clone(),
        position_title: detail.position.position_title.clone(),
        location: detail.company.location.clone(),
        profile_image_key: detail.company.profile_image_key.clone(),
        tags: detail.company.tags.clone(),
        is_bookmarked: detail.is_bookmarked,
        employment_end_date: detail.position.employment_end_date.clone(),
        domain: detail.company.domain.clone(),
    }
}

fn print_posts(posts: &[PostSummary]) {
    if posts.is_empty() {
        println!("No postings found.");
        return;
    }
    println!(
        "{:<2} {:<24} {:<22} {:<30} {:<12} {:<10}",
        "", "ID", "COMPANY", "POSITION", "LOCATION", "DEADLINE"
    );
    println!("{}", "-".repeat(104));
    for post in posts {
        let deadline = post
            .employment_end_date
            .as_deref()
            .map(models::format_date)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<2} {:<24} {:<22} {:<30} {:<12} {:<10}",
            if post.is_bookmarked { "*" } else { "" },
            truncate(&post.id, 22),
            truncate(&post.company_name, 20),
            truncate(&post.position_title, 28),
            truncate(post.primary_location(), 10),
            deadline
        );
        let tags: Vec<&str> = post.card_tags().collect();
        if !tags.is_empty() {
            println!("{:<27} #{}", "", tags.join(" #"));
        }
    }
}

fn print_filter(store: &FilterStore<'_>) {
    let state = store.state();
    let roles: Vec<&str> = state.roles.iter().map(|r| r.as_str()).collect();
    let domains: Vec<&str> = state.domains.iter().map(|d| d.as_str()).collect();
    let changes = state.secondary_changes();
    let mark = |changed: bool| if changed { " *" } else { "" };

    println!("Roles:   {}", if roles.is_empty() { "all".to_string() } else { roles.join(", ") });
    println!("Status:  {}{}", state.active.label(), mark(changes.status));
    println!(
        "Domains: {}{}",
        if domains.is_empty() { "all".to_string() } else { domains.join(", ") },
        mark(changes.domains)
    );
    println!("Sort:    {}{}", state.order.label(), mark(changes.sort));
    println!("Page:    {}", state.page + 1);
    println!("\nShare query: ?{}", store.location().query());
}

fn print_detail(detail: &PostDetail, api_url: &str) {
    let position = &detail.position;
    let company = &detail.company;

    println!("{}", position.position_title);
    println!("{}", "=".repeat(position.position_title.chars().count().min(78)));
    println!("Company: {}", company.company_name);
    if let Some(slogan) = &company.slogan {
        println!("  {}", slogan);
    }
    if let Some(kind) = &position.position_type {
        println!("Position: {}", kind);
    }
    if let Some(count) = position.head_count {
        println!("Openings: {}", count);
    }
    println!("{}", models::format_salary(position.salary));
    if let Some(deadline) = &position.employment_end_date {
        println!("Deadline: {}", models::format_date(deadline));
    }
    if !company.location.is_empty() {
        println!("Location: {}", company.location.replace('|', " "));
    }
    if let Some(domain) = &company.domain {
        println!("Domain: {}", domain);
    }
    if let Some(year) = company.company_established_year {
        println!("Founded: {}", year);
    }
    if let Some(headcount) = company.headcount {
        println!("Employees: {}", headcount);
    }
    if !company.tags.is_empty() {
        let tags: Vec<&str> = company.tags.iter().map(|t| t.tag.as_str()).collect();
        println!("Tags: #{}", tags.join(" #"));
    }
    if let Some(landing) = &company.landing_page_link {
        println!("Website: {}", landing);
    }
    for link in &company.links {
        println!("  - {} ({})", link.link, link.description);
    }
    if let Some(key) = &company.company_info_pdf_key {
        println!("Company brochure: {}", models::image_url(api_url, key));
    }
    println!(
        "Bookmark: {}  |  Coffee chats: {}",
        if detail.is_bookmarked { "yes" } else { "no" },
        detail.coffee_chat_count
    );
    if !position.detail.is_empty() {
        println!("\n--- Details ---\n{}", textwrap::fill(&position.detail, 78));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("와플스튜디오인턴", 6), "와플스...");
    }

    #[test]
    fn test_parse_link() {
        let link = parse_link("https://github.com/kim | GitHub");
        assert_eq!(link.link, "https://github.com/kim");
        assert_eq!(link.description, "GitHub");
        assert_eq!(parse_link("https://blog.kim").description, "");
    }

    #[test]
    fn test_cli_parses_filter_role() {
        let cli = Cli::try_parse_from(["internhasha", "filter", "role", "FRONT"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Filter {
                command: FilterCommands::Role { role: RoleTag::Front }
            }
        ));
    }
}
