use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insightforge::cli::commands::generate::{CoursesArgs, LayoutArgs, SummarizeArgs};
use insightforge::cli::commands::{config, doctor, generate, init, pdf};
use insightforge::cli::ui::Output;
use insightforge::cli::CommandContext;
use insightforge::tasks::ApiResponse;

#[derive(Parser)]
#[command(name = "insightforge")]
#[command(
    version,
    about = "Resilient AI generation backend for course, quiz and study tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Use this config file only")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize InsightForge in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Check configuration, credentials and storage
    Doctor,

    /// Generate a course layout
    Layout {
        #[arg(long, help = "Owner email")]
        email: Option<String>,
        #[arg(long, help = "Course id (generated when omitted)")]
        course_id: Option<String>,
        #[arg(long, help = "JSON file with form fields")]
        form: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, help = "Beginner, Moderate or Advanced")]
        level: Option<String>,
        #[arg(long, help = "Number of chapters")]
        chapters: Option<u32>,
        #[arg(long)]
        include_video: bool,
    },

    /// Generate chapter content for a stored course
    Content {
        #[arg(help = "Course id")]
        course_id: String,
        #[arg(long, help = "Regenerate a single chapter (0-based)")]
        chapter: Option<usize>,
        #[arg(long, help = "Attach video references (defaults to the course setting)")]
        include_video: Option<bool>,
        #[arg(long, help = "Print stored content without generating")]
        fetch: bool,
    },

    /// Generate a multiple-choice quiz
    Quiz {
        #[arg(help = "Quiz topic")]
        topic: String,
        #[arg(long, short = 'n', help = "Number of questions")]
        count: Option<u32>,
    },

    /// Save a quiz result
    QuizResult {
        #[arg(long)]
        email: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        score: u32,
        #[arg(long)]
        total: u32,
    },

    /// List saved quiz results
    QuizHistory {
        #[arg(long)]
        email: String,
    },

    /// Correct grammar and spelling
    Grammar {
        #[arg(help = "Text to correct")]
        text: Option<String>,
        #[arg(long, short, help = "Read text from file")]
        file: Option<PathBuf>,
    },

    /// Ask the learning assistant
    Chat {
        #[arg(help = "Question")]
        message: String,
    },

    /// Chat with stored PDF text
    Pdf {
        #[command(subcommand)]
        action: PdfAction,
    },

    /// Summarize a YouTube video
    Summarize {
        #[arg(help = "Video URL")]
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, help = "Transcript text file")]
        transcript: Option<PathBuf>,
    },

    /// Extract text from an image
    Ocr {
        #[arg(help = "File containing base64 image data or a data URL")]
        image: PathBuf,
        #[arg(long, help = "Image MIME type (default: image/png)")]
        mime: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Generate an image from a prompt
    Image {
        #[arg(help = "Image description")]
        prompt: String,
    },

    /// List stored courses
    Courses {
        #[arg(long, help = "List every course with generated content", conflicts_with_all = ["id", "email"])]
        generated: bool,
        #[arg(long, requires = "generated", help = "Filter generated courses by name")]
        search: Option<String>,
        #[arg(long, help = "Courses owned by this email")]
        email: Option<String>,
        #[arg(long, conflicts_with = "email", help = "Load a single course")]
        id: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PdfAction {
    /// Store extracted PDF text
    Add {
        #[arg(long)]
        email: String,
        #[arg(long, help = "Original file name (must end in .pdf)")]
        name: String,
        #[arg(help = "Text file extracted from the PDF")]
        text: PathBuf,
    },
    /// Ask a question about a stored PDF
    Ask {
        #[arg(help = "PDF id")]
        id: i64,
        #[arg(help = "Question")]
        question: String,
        #[arg(long)]
        email: String,
    },
    /// List stored PDFs
    List {
        #[arg(long)]
        email: String,
    },
    /// Delete a stored PDF
    Delete {
        #[arg(help = "PDF id")]
        id: i64,
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mInsightForge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run a task command and print its envelope; false when the envelope is an error
fn run_task<F, Fut>(config_path: Option<&std::path::Path>, task: F) -> anyhow::Result<bool>
where
    F: FnOnce(CommandContext) -> Fut,
    Fut: Future<Output = insightforge::Result<ApiResponse>>,
{
    let ctx = CommandContext::load(config_path)?;
    let rt = Runtime::new()?;
    let response = rt.block_on(task(ctx))?;
    Output::new().envelope(&response);
    Ok(response.is_success())
}

fn run_cli() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // Logs go to stderr so envelopes on stdout stay parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            init::run(force)?;
            Ok(true)
        }
        Commands::Doctor => Ok(doctor::run(config_path)?),
        Commands::Layout {
            email,
            course_id,
            form,
            name,
            description,
            category,
            level,
            chapters,
            include_video,
        } => {
            let args = LayoutArgs {
                email,
                course_id,
                form,
                name,
                description,
                category,
                level,
                chapters,
                include_video,
            };
            run_task(config_path, |ctx| async move { generate::layout(&ctx, args).await })
        }
        Commands::Content {
            course_id,
            chapter,
            include_video,
            fetch,
        } => run_task(config_path, |ctx| async move {
            generate::content(&ctx, &course_id, chapter, include_video, fetch).await
        }),
        Commands::Quiz { topic, count } => {
            run_task(config_path, |ctx| async move { generate::quiz(&ctx, topic, count).await })
        }
        Commands::QuizResult {
            email,
            topic,
            score,
            total,
        } => run_task(config_path, |ctx| async move {
            generate::quiz_result(&ctx, email, topic, score, total)
        }),
        Commands::QuizHistory { email } => {
            run_task(config_path, |ctx| async move { generate::quiz_history(&ctx, &email) })
        }
        Commands::Grammar { text, file } => {
            run_task(config_path, |ctx| async move { generate::grammar(&ctx, text, file).await })
        }
        Commands::Chat { message } => {
            run_task(config_path, |ctx| async move { generate::chat(&ctx, message).await })
        }
        Commands::Pdf { action } => match action {
            PdfAction::Add { email, name, text } => run_task(config_path, |ctx| async move {
                pdf::add(&ctx, &email, &name, &text)
            }),
            PdfAction::Ask {
                id,
                question,
                email,
            } => run_task(config_path, |ctx| async move {
                pdf::ask(&ctx, id, &question, &email).await
            }),
            PdfAction::List { email } => {
                run_task(config_path, |ctx| async move { pdf::list(&ctx, &email) })
            }
            PdfAction::Delete { id, email } => {
                run_task(config_path, |ctx| async move { pdf::delete(&ctx, id, &email) })
            }
        },
        Commands::Summarize {
            url,
            title,
            keywords,
            description,
            transcript,
        } => {
            let args = SummarizeArgs {
                url: Some(url),
                title,
                keywords,
                description,
                transcript,
            };
            run_task(config_path, |ctx| async move { generate::summarize(&ctx, args).await })
        }
        Commands::Ocr { image, mime, prompt } => run_task(config_path, |ctx| async move {
            generate::ocr(&ctx, image, mime, prompt).await
        }),
        Commands::Image { prompt } => {
            run_task(config_path, |ctx| async move { generate::image(&ctx, prompt).await })
        }
        Commands::Courses {
            generated,
            search,
            email,
            id,
        } => {
            let args = CoursesArgs {
                generated,
                search,
                email,
                id,
            };
            run_task(config_path, |ctx| async move { generate::courses(&ctx, args) })
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show { global, format } => config::show(global, &format)?,
                ConfigAction::Path => config::path()?,
                ConfigAction::Init { global, force } => config::init(global, force)?,
            }
            Ok(true)
        }
    }
}
