use clap::Parser;
use forum_client::models::{Post, ThreadEntry};
use forum_client::{ForumClient, ForumClientHttp, ListOptions};
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(short, long)]
    server: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct PageArgs {
    /// username, email or timestamp
    #[clap(long)]
    sort_by: Option<String>,
    #[clap(long)]
    order: Option<String>,
    #[clap(long)]
    page: Option<i64>,
    #[clap(long)]
    page_size: Option<i64>,
}

impl From<PageArgs> for ListOptions {
    fn from(args: PageArgs) -> Self {
        ListOptions {
            sort_by: args.sort_by,
            order: args.order,
            page: args.page,
            page_size: args.page_size,
        }
    }
}

#[derive(Parser, Debug)]
enum Command {
    Register {
        #[clap(long)]
        username: String,
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
    },
    Login {
        #[clap(long)]
        username: String,
        #[clap(long)]
        password: String,
    },
    Logout,
    ListPosts {
        #[clap(flatten)]
        page: PageArgs,
    },
    /// Print posts with their replies indented below them
    Threads {
        #[clap(flatten)]
        page: PageArgs,
    },
    GetPost {
        id: Uuid,
    },
    CreatePost {
        #[clap(long)]
        text: String,
        #[clap(long)]
        parent: Option<Uuid>,
    },
    UpdatePost {
        id: Uuid,
        #[clap(long)]
        text: Option<String>,
        #[clap(long)]
        parent: Option<Uuid>,
    },
    DeletePost {
        id: Uuid,
    },
    Search {
        query: Option<String>,
        #[clap(long)]
        username: Option<String>,
        #[clap(long)]
        size: Option<i64>,
    },
    Suggest {
        prefix: String,
    },
}

fn print_post(post: &Post) {
    println!(
        "[{}] {} <{}> at {}",
        post.id,
        post.username,
        post.email,
        post.timestamp.format("%Y-%m-%d %H:%M")
    );
    if let Some(parent) = post.parent_post_id {
        println!("  reply to {parent}");
    }
    println!("  {}", post.text);
}

fn print_thread_entry(entry: &ThreadEntry) {
    let indent = " ".repeat(entry.depth);
    let marker = if entry.is_leaf { "*" } else { "-" };
    println!(
        "{indent}{marker} [{}] {}: {}",
        entry.post.id, entry.post.username, entry.post.text
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let endpoint = args.server.as_deref().unwrap_or("http://127.0.0.1:8080");
    let mut client = ForumClientHttp::connect(endpoint).await?;

    match args.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = client.register(username, email, password).await?;
            println!("Registered as {} ({})", user.username, user.id);
        }
        Command::Login { username, password } => {
            let user = client.login(username, password).await?;
            println!("Logged in as {}", user.username);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::ListPosts { page } => {
            let page = client.list_posts(page.into()).await?;
            println!(
                "Posts {}-{} of {} (sorted by {} {})",
                (page.page - 1) * page.page_size + 1,
                (page.page - 1) * page.page_size + page.items.len() as i64,
                page.total,
                page.sort_by,
                page.order
            );
            for post in &page.items {
                print_post(post);
            }
        }
        Command::Threads { page } => {
            let page = client.list_threads(page.into()).await?;
            println!("Page {} ({} posts total)", page.page, page.total);
            for entry in &page.items {
                print_thread_entry(entry);
            }
        }
        Command::GetPost { id } => {
            let post = client.get_post(id).await?;
            print_post(&post);
        }
        Command::CreatePost { text, parent } => {
            let post = client.create_post(text, parent).await?;
            println!("Post created! ID: {}", post.id);
        }
        Command::UpdatePost { id, text, parent } => {
            let post = client.update_post(id, text, parent).await?;
            print_post(&post);
        }
        Command::DeletePost { id } => {
            let deleted = client.delete_post(id).await?;
            println!("Deleted {} post(s)", deleted.len());
        }
        Command::Search {
            query,
            username,
            size,
        } => {
            let results = client.search(query, username, size).await?;
            if let Some(error) = results.error {
                eprintln!("Search failed: {error}");
            }
            println!("{} match(es)", results.total);
            for hit in results.hits {
                println!("- [{}] {}: {}", hit.id, hit.username, hit.text);
            }
        }
        Command::Suggest { prefix } => {
            for suggestion in client.suggest(prefix).await? {
                println!("{suggestion}");
            }
        }
    }

    Ok(())
}
