mod adapters;
mod config;
mod core;

use crate::adapters::github::{GitHubApi, Reaction, RepoRef};
use crate::adapters::rest::RestClient;
use crate::core::planner::{PlanOptions, SubmissionPlan};
use crate::core::request::{CommentKind, CommentRequest, ReviewEvent, ReviewSpec};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ghcomment")]
#[command(about = "Line-level pull request comments, batch reviews and replies for GitHub", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short = 'R', long, global = true, help = "Repository as owner/name (defaults to the origin remote)")]
    repo: Option<String>,

    #[arg(short, long, global = true, help = "Pull request number (defaults to the current branch's PR)")]
    pr: Option<u64>,

    #[arg(long, global = true, help = "Config file (defaults to .ghcomment.yml)")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(bool),
        help = "Validate comment lines against the PR diff (true/false)"
    )]
    validate: Option<bool>,

    #[arg(long, global = true, help = "Post [SUGGEST: ...] markers literally")]
    no_expand_suggestions: bool,

    #[arg(long, global = true, help = "Show what would be posted without calling GitHub")]
    dry_run: bool,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a review with line comments in one call")]
    Review {
        #[arg(value_name = "[PR] [BODY]", num_args = 0..=2)]
        args: Vec<String>,

        #[arg(short, long = "comment", value_name = "FILE:LINE[-END]:MESSAGE")]
        comments: Vec<String>,

        #[arg(short, long, help = "APPROVE, REQUEST_CHANGES or COMMENT")]
        event: Option<String>,
    },
    #[command(about = "Post one line, range, or general comment")]
    Add {
        #[arg(value_name = "[PR] [FILE LINE] [MESSAGE]", num_args = 0..=4)]
        args: Vec<String>,

        #[arg(short, long = "message", help = "Message line (repeatable, joined with newlines)")]
        messages: Vec<String>,

        #[arg(long = "type", default_value = "review", value_parser = parse_comment_kind)]
        kind: CommentKind,
    },
    #[command(about = "Submit comments and a review from a YAML file")]
    Batch {
        #[arg(value_name = "PR")]
        number: u64,

        file: PathBuf,
    },
    #[command(about = "Show which lines of a file accept review comments")]
    Lines {
        #[arg(value_name = "PR")]
        number: u64,

        file: String,
    },
    #[command(about = "List issue and review comments on a PR")]
    List {
        #[arg(value_name = "PR")]
        number: Option<u64>,

        #[arg(long, help = "Filter by author (wildcards: 'alice*', '*bot')")]
        author: Option<String>,

        #[arg(long = "type", value_parser = parse_comment_kind)]
        kind: Option<CommentKind>,

        #[arg(long, help = "Comments created at or after (2024-01-31, '2024-01-31 09:00', 3d, 12h, 2w)")]
        since: Option<String>,

        #[arg(long, help = "Comments created at or before")]
        until: Option<String>,

        #[arg(long, help = "all, open or resolved")]
        status: Option<String>,

        #[arg(long, default_value = "text")]
        format: ListFormat,
    },
    #[command(about = "Export PR comments as JSON, CSV, or Markdown")]
    Export {
        #[arg(value_name = "PR")]
        number: Option<u64>,

        #[arg(short, long, default_value = "json", help = "json, csv or markdown")]
        format: String,

        #[arg(short, long, help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(long, value_delimiter = ',', help = "Fields to include (id,type,author,body,file,line,created_at,url,commit_id,resolved)")]
        include: Vec<String>,

        #[arg(long)]
        include_resolved: bool,
    },
    #[command(about = "Reply to, react to, or resolve a comment")]
    Reply {
        comment_id: u64,

        message: Option<String>,

        #[arg(long)]
        reaction: Option<String>,

        #[arg(long)]
        remove_reaction: Option<String>,

        #[arg(long, help = "Resolve the review thread")]
        resolve: bool,

        #[arg(long = "type", default_value = "review", value_parser = parse_comment_kind)]
        kind: CommentKind,
    },
    #[command(about = "Replace the body of an existing comment")]
    Edit {
        comment_id: u64,

        message: String,

        #[arg(long = "type", default_value = "review", value_parser = parse_comment_kind)]
        kind: CommentKind,
    },
    #[command(about = "Submit a pending review started in GitHub's web interface")]
    ClosePendingReview {
        #[arg(value_name = "[PR] [BODY]", num_args = 0..=2)]
        args: Vec<String>,

        #[arg(short, long, help = "APPROVE, REQUEST_CHANGES or COMMENT")]
        event: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

fn parse_comment_kind(value: &str) -> Result<CommentKind, String> {
    value.parse().map_err(|err: core::error::ValidationError| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load().unwrap_or_else(|err| {
            warn!("Ignoring unreadable config: {:#}", err);
            config::Config::default()
        }),
    };
    config.merge_with_cli(cli.repo.clone(), cli.pr, cli.validate);
    if cli.no_expand_suggestions {
        config.expand_suggestions = false;
    }

    // A batch file's repo overrides flags and config.
    let batch = match &cli.command {
        Commands::Batch { file, .. } => {
            let batch = core::batch::BatchFile::load(file)?;
            if let Some(repo) = &batch.repo {
                config.repo = Some(repo.clone());
            }
            Some(batch)
        }
        _ => None,
    };

    let session = Session::new(config, cli.dry_run)?;

    match cli.command {
        Commands::Review {
            args,
            comments,
            event,
        } => {
            review_command(&session, args, comments, event).await?;
        }
        Commands::Add {
            args,
            messages,
            kind,
        } => {
            add_command(&session, args, &messages, kind).await?;
        }
        Commands::Batch { number, file } => {
            if let Some(batch) = batch {
                batch_command(&session, number, &file, batch).await?;
            }
        }
        Commands::Lines { number, file } => {
            lines_command(&session, number, &file).await?;
        }
        Commands::List {
            number,
            author,
            kind,
            since,
            until,
            status,
            format,
        } => {
            let options = ListArgs {
                author,
                kind,
                since,
                until,
                status,
                format,
            };
            list_command(&session, number, options).await?;
        }
        Commands::Export {
            number,
            format,
            output,
            include,
            include_resolved,
        } => {
            let options = ExportArgs {
                format,
                output,
                include,
                include_resolved,
            };
            export_command(&session, number, options).await?;
        }
        Commands::Reply {
            comment_id,
            message,
            reaction,
            remove_reaction,
            resolve,
            kind,
        } => {
            let action = ReplyAction::new(message, reaction, remove_reaction, resolve)?;
            reply_command(&session, comment_id, kind, action).await?;
        }
        Commands::Edit {
            comment_id,
            message,
            kind,
        } => {
            edit_command(&session, comment_id, kind, &message).await?;
        }
        Commands::ClosePendingReview { args, event } => {
            close_pending_review_command(&session, args, event).await?;
        }
    }

    Ok(())
}

/// Settings resolved once per invocation.
struct Session {
    config: config::Config,
    repo: RepoRef,
    dry_run: bool,
}

impl Session {
    fn new(config: config::Config, dry_run: bool) -> Result<Self> {
        let repo = core::git::resolve_repository(config.repo.as_deref())?;
        debug!("Using repository {}", repo);
        Ok(Self {
            config,
            repo,
            dry_run,
        })
    }

    fn pr(&self, positional: Option<u64>) -> Result<u64> {
        match positional.or(self.config.pr) {
            Some(pr) => Ok(pr),
            None => core::git::detect_pr_number(&self.repo)
                .context("failed to detect PR number (pass it as an argument or with --pr)"),
        }
    }

    fn client(&self) -> Result<Arc<dyn GitHubApi>> {
        let token = match self.config.token_from_env() {
            Some(token) => token,
            None => core::git::gh_auth_token().context(
                "GitHub token not found. Set GITHUB_TOKEN or GH_TOKEN, add token to .ghcomment.yml, or run 'gh auth login'",
            )?,
        };
        let client = RestClient::new(
            &self.config.api_url,
            token,
            Duration::from_secs(self.config.timeout_secs),
            self.config.retry_count,
        )?;
        Ok(Arc::new(client))
    }

    fn plan_options(&self, pr: u64) -> PlanOptions {
        PlanOptions {
            validate: self.config.validate,
            expand_suggestions: self.config.expand_suggestions,
            pr: Some(pr),
        }
    }

    fn default_event(&self, flag: Option<String>) -> Result<Option<ReviewEvent>> {
        match flag.or_else(|| self.config.review.event.clone()) {
            Some(event) if !event.trim().is_empty() => Ok(Some(event.parse()?)),
            _ => Ok(None),
        }
    }

    fn render(&self, body: &str) -> String {
        if self.config.expand_suggestions {
            core::suggestion::expand_suggestions(body)
        } else {
            body.to_string()
        }
    }
}

/// Splits `[PR] [TEXT]` positionals: a leading number is the PR.
fn split_pr_arg(args: Vec<String>) -> (Option<u64>, Option<String>) {
    let mut iter = args.into_iter().peekable();
    let pr = match iter.peek().map(|first| first.parse::<u64>()) {
        Some(Ok(pr)) => {
            iter.next();
            Some(pr)
        }
        _ => None,
    };
    (pr, iter.next())
}

async fn review_command(
    session: &Session,
    args: Vec<String>,
    comment_specs: Vec<String>,
    event: Option<String>,
) -> Result<()> {
    let (pr, body) = split_pr_arg(args);
    let pr = session.pr(pr)?;

    let requests = comment_specs
        .iter()
        .enumerate()
        .map(|(i, spec)| core::request::parse_comment_spec(spec).map_err(|err| err.at(i + 1)))
        .collect::<Result<Vec<_>, _>>()?;
    let review = ReviewSpec {
        body,
        event: session.default_event(event)?,
    };

    submit_requests(session, pr, &requests, &review).await
}

async fn add_command(
    session: &Session,
    args: Vec<String>,
    messages: &[String],
    kind: CommentKind,
) -> Result<()> {
    let (pr, request) = parse_add_args(args, messages, kind)?;
    let pr = session.pr(pr)?;
    submit_requests(session, pr, &[request], &ReviewSpec::default()).await
}

/// `add [PR] <FILE> <LINE> [MESSAGE]` for review comments, `add [PR] [MESSAGE]`
/// with `--type issue`. `-m` values stand in for the positional message.
fn parse_add_args(
    mut args: Vec<String>,
    messages: &[String],
    kind: CommentKind,
) -> Result<(Option<u64>, CommentRequest)> {
    let from_flags = !messages.is_empty();
    let location_args = match kind {
        CommentKind::Review => 2,
        CommentKind::Issue => 0,
    };
    let needed = location_args + usize::from(!from_flags);

    let pr = match args.len().checked_sub(needed) {
        Some(0) => None,
        Some(1) => {
            let first = args.remove(0);
            let pr = first
                .parse::<u64>()
                .with_context(|| format!("invalid PR number '{}'", first))?;
            Some(pr)
        }
        _ => anyhow::bail!(
            "invalid arguments. Use: ghcomment add [PR] <FILE> <LINE> <MESSAGE>, ghcomment add [PR] <FILE> <LINE> -m <LINE>..., or ghcomment add [PR] <MESSAGE> --type issue"
        ),
    };

    let message = if from_flags {
        messages.join("\n")
    } else {
        args.pop().unwrap_or_default()
    };

    let request = match kind {
        CommentKind::Issue => CommentRequest::issue(&message),
        CommentKind::Review => {
            let line_spec = args.pop().unwrap_or_default();
            let file = args.pop().unwrap_or_default();
            line_request(&file, &line_spec, &message)?
        }
    };
    Ok((pr, request))
}

/// `42` is a single line; `42:45` and `42-45` are ranges.
fn line_request(file: &str, line_spec: &str, message: &str) -> Result<CommentRequest> {
    let spec = line_spec.trim();
    if spec.contains(':') || spec.contains('-') {
        return Ok(CommentRequest::review_range(file, &spec.replacen(':', "-", 1), message));
    }
    let line = spec.parse::<i64>().map_err(|_| {
        core::error::ValidationError::new(
            core::error::ValidationKind::InvalidLine,
            format!("invalid line number: {}", line_spec),
        )
    })?;
    Ok(CommentRequest::review(file, line, message))
}

async fn batch_command(
    session: &Session,
    number: u64,
    file: &Path,
    batch: core::batch::BatchFile,
) -> Result<()> {
    let pr = batch.pr.unwrap_or(number);
    info!(
        "Processing {} comments from {} on {}#{}",
        batch.comments.len(),
        file.display(),
        session.repo,
        pr
    );
    let (requests, mut review) = batch.into_requests()?;
    if review.event.is_none() {
        review.event = session.default_event(None)?;
    }
    submit_requests(session, pr, &requests, &review).await
}

/// Submits through the shared review flow, or previews the plan on a dry run.
async fn submit_requests(
    session: &Session,
    pr: u64,
    requests: &[CommentRequest],
    review: &ReviewSpec,
) -> Result<()> {
    let options = session.plan_options(pr);

    if session.dry_run {
        let api = session
            .client()
            .map_err(|err| warn!("No GitHub client for dry run ({:#}); skipping line validation", err))
            .ok();
        let plan = core::workflow::prepare_plan(
            api.as_deref(),
            &session.repo,
            pr,
            options,
            requests,
            review,
        )
        .await?;
        print!("{}", format_plan(&plan, &session.repo, pr));
        return Ok(());
    }

    let api = session.client()?;
    let report =
        core::workflow::submit_requests(api.as_ref(), &session.repo, pr, options, requests, review)
            .await?;
    println!("✅ PR #{}: {}", pr, report);
    Ok(())
}

fn format_plan(plan: &SubmissionPlan, repo: &RepoRef, pr: u64) -> String {
    let mut out = format!("Would submit to {} PR #{}:\n", repo, pr);

    if !plan.issue_comments.is_empty() {
        out.push_str(&format!("  {} issue comment(s):\n", plan.issue_comments.len()));
        for (i, comment) in plan.issue_comments.iter().enumerate() {
            out.push_str(&format!("    {}. {}\n", i + 1, truncate(&comment.body, 60)));
        }
    }

    if let Some(review) = &plan.review {
        out.push_str(&format!(
            "  Review ({}) with {} review comment(s)\n",
            review.event,
            review.comments.len()
        ));
        if !review.body.is_empty() {
            out.push_str(&format!("    Body: {}\n", truncate(&review.body, 60)));
        }
        for (i, comment) in review.comments.iter().enumerate() {
            let location = match comment.start_line {
                Some(start) => format!("{}:{}-{}", comment.path, start, comment.line),
                None => format!("{}:{}", comment.path, comment.line),
            };
            out.push_str(&format!(
                "    {}. {} - {}\n",
                i + 1,
                location,
                truncate(&comment.body, 60)
            ));
        }
    }

    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

async fn lines_command(session: &Session, pr: u64, file: &str) -> Result<()> {
    let api = session.client()?;
    let diff = api
        .fetch_pr_diff(&session.repo, pr)
        .await
        .with_context(|| format!("failed to fetch diff for PR #{}", pr))?;
    let index = core::diff_index::DiffIndex::from_pr_diff(&diff);
    print!("{}", format_lines(&index, pr, file));
    Ok(())
}

fn format_lines(index: &core::diff_index::DiffIndex, pr: u64, file: &str) -> String {
    match index.lookup(file) {
        None => {
            let mut out = format!("File '{}' is not part of PR #{}'s diff.\n", file, pr);
            if !index.is_empty() {
                out.push_str("\nFiles in this PR:\n");
                for path in index.files() {
                    out.push_str(&format!("  • {}\n", path));
                }
            }
            out
        }
        Some(lines) if lines.is_empty() => format!(
            "No commentable lines for '{}' in PR #{} (binary, deleted, or metadata-only change).\n",
            file, pr
        ),
        Some(lines) => {
            let ranges = core::diff_index::format_ranges(&index.ranges_for(file));
            let listed = lines
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Commentable lines in '{}' (PR #{}):\n  Ranges: {}\n  Lines:  {}\n\nExample: ghcomment review {} --comment '{}:{}:your comment'\n",
                file,
                pr,
                ranges,
                listed,
                pr,
                file,
                lines.iter().next().copied().unwrap_or_default()
            )
        }
    }
}

struct ListArgs {
    author: Option<String>,
    kind: Option<CommentKind>,
    since: Option<String>,
    until: Option<String>,
    status: Option<String>,
    format: ListFormat,
}

async fn list_command(session: &Session, number: Option<u64>, args: ListArgs) -> Result<()> {
    let pr = session.pr(number)?;
    let now = chrono::Utc::now();
    let parse_date = |value: &Option<String>, flag: &str| -> Result<_> {
        value
            .as_deref()
            .map(|text| {
                core::filter::parse_flexible_date(text, now)
                    .with_context(|| format!("invalid --{} value", flag))
            })
            .transpose()
    };

    let options = core::filter::FilterOptions {
        kind: args.kind,
        author: args.author.or_else(|| session.config.author.clone()),
        since: parse_date(&args.since, "since")?,
        until: parse_date(&args.until, "until")?,
        status: args.status.as_deref().unwrap_or("all").parse()?,
    };
    options.validate()?;

    let api = session.client()?;
    let pool = core::filter::StringPool::new();
    let comments = core::listing::fetch_all_comments(
        api,
        &session.repo,
        pr,
        Duration::from_secs(session.config.timeout_secs),
        &pool,
    )
    .await?;
    let total = comments.len();
    let comments = core::filter::CommentFilter::new(options).apply(comments);
    debug!(
        "{} of {} comments kept after filtering ({} distinct strings)",
        comments.len(),
        total,
        pool.len()
    );

    match args.format {
        ListFormat::Text => print!("{}", core::listing::render_text(&comments, pr, now)),
        ListFormat::Json => println!("{}", core::listing::render_json(&comments, pr)?),
    }
    Ok(())
}

struct ExportArgs {
    format: String,
    output: Option<PathBuf>,
    include: Vec<String>,
    include_resolved: bool,
}

async fn export_command(session: &Session, number: Option<u64>, args: ExportArgs) -> Result<()> {
    let pr = session.pr(number)?;
    let format: core::export::ExportFormat = args.format.parse()?;
    let fields = core::export::parse_fields(&args.include)?;

    let api = session.client()?;
    let pool = core::filter::StringPool::new();
    let mut comments = core::listing::fetch_all_comments(
        api,
        &session.repo,
        pr,
        Duration::from_secs(session.config.timeout_secs),
        &pool,
    )
    .await?;
    if !args.include_resolved {
        comments.retain(|comment| !comment.resolved);
    }

    let mut rendered = core::export::render(
        format,
        &comments,
        &fields,
        &session.repo,
        pr,
        chrono::Utc::now(),
    )?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            info!(
                "Exported {} comments from PR #{} to {}",
                comments.len(),
                pr,
                path.display()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// What `reply` should do, validated before any call is made.
#[derive(Debug, PartialEq, Eq)]
struct ReplyAction {
    message: Option<String>,
    reaction: Option<Reaction>,
    remove_reaction: Option<Reaction>,
    resolve: bool,
}

impl ReplyAction {
    fn new(
        message: Option<String>,
        reaction: Option<String>,
        remove_reaction: Option<String>,
        resolve: bool,
    ) -> Result<Self> {
        let message = message.filter(|m| !m.trim().is_empty());
        if message.is_none() && reaction.is_none() && remove_reaction.is_none() && !resolve {
            anyhow::bail!("must provide a message, --reaction, --remove-reaction, or --resolve");
        }
        if reaction.is_some() && remove_reaction.is_some() {
            anyhow::bail!("cannot use both --reaction and --remove-reaction at the same time");
        }
        if let Some(message) = &message {
            core::request::validate_comment_body(message)?;
        }

        Ok(Self {
            message,
            reaction: reaction.as_deref().map(str::parse).transpose()?,
            remove_reaction: remove_reaction.as_deref().map(str::parse).transpose()?,
            resolve,
        })
    }
}

async fn reply_command(
    session: &Session,
    comment_id: u64,
    kind: CommentKind,
    action: ReplyAction,
) -> Result<()> {
    if action.resolve && kind == CommentKind::Issue {
        anyhow::bail!("--resolve only applies to review comments");
    }
    // Reactions address the comment directly; threading and resolving need the PR.
    let pr = if action.message.is_some() || action.resolve {
        session.pr(None)?
    } else {
        session.config.pr.unwrap_or_default()
    };

    if session.dry_run {
        println!("Would update {} comment #{} on PR #{}:", kind, comment_id, pr);
        if let Some(reaction) = action.reaction {
            println!("  Add reaction: {}", reaction);
        }
        if let Some(reaction) = action.remove_reaction {
            println!("  Remove reaction: {}", reaction);
        }
        if let Some(message) = &action.message {
            println!("  Reply: {}", truncate(&session.render(message), 60));
        }
        if action.resolve {
            println!("  Resolve conversation");
        }
        return Ok(());
    }

    let api = session.client()?;
    let submitter = core::submitter::ReviewSubmitter::new(api.as_ref(), &session.repo, pr);

    if let Some(reaction) = action.reaction {
        submitter.react(comment_id, kind, reaction).await?;
        println!("✅ Added {} reaction to comment #{}", reaction, comment_id);
    }
    if let Some(reaction) = action.remove_reaction {
        submitter.unreact(comment_id, kind, reaction).await?;
        println!("✅ Removed {} reaction from comment #{}", reaction, comment_id);
    }
    if let Some(message) = &action.message {
        let reply = submitter
            .reply(comment_id, kind, &session.render(message))
            .await?;
        match kind {
            CommentKind::Review => println!("✅ Replied to review comment #{}", comment_id),
            CommentKind::Issue => println!(
                "✅ Posted issue comment #{} in reply to #{} (issue comments cannot be threaded)",
                reply.id, comment_id
            ),
        }
    }
    if action.resolve {
        submitter.resolve(comment_id).await?;
        println!("✅ Resolved conversation for review comment #{}", comment_id);
    }
    Ok(())
}

async fn edit_command(session: &Session, comment_id: u64, kind: CommentKind, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("message cannot be empty");
    }
    let body = session.render(message);
    core::request::validate_comment_body(&body)?;

    if session.dry_run {
        println!("Would edit {} comment #{}:", kind, comment_id);
        println!("  New body: {}", truncate(&body, 60));
        return Ok(());
    }

    let api = session.client()?;
    let pr = session.config.pr.unwrap_or_default();
    core::submitter::ReviewSubmitter::new(api.as_ref(), &session.repo, pr)
        .edit(comment_id, kind, &body)
        .await?;
    println!("✅ Edited {} comment #{}", kind, comment_id);
    Ok(())
}

async fn close_pending_review_command(
    session: &Session,
    args: Vec<String>,
    event: Option<String>,
) -> Result<()> {
    let (pr, body) = split_pr_arg(args);
    let pr = session.pr(pr)?;
    let event = session.default_event(event)?.unwrap_or(ReviewEvent::Comment);
    let body = session.render(body.as_deref().unwrap_or(""));
    core::request::validate_comment_body(&body)?;

    if session.dry_run {
        println!("Would submit pending review on PR #{} as {}", pr, event);
        if !body.is_empty() {
            println!("  Body: {}", truncate(&body, 60));
        }
        return Ok(());
    }

    let api = session.client()?;
    let review_id = core::submitter::ReviewSubmitter::new(api.as_ref(), &session.repo, pr)
        .close_pending_review(&body, event)
        .await?;
    println!(
        "✅ Submitted pending review #{} and {} PR #{}",
        review_id,
        event.past_tense(),
        pr
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::github::{ReviewCommentInput, Side};
    use crate::core::planner::{IssueComment, ReviewPlan};

    #[test]
    fn leading_number_is_the_pr() {
        assert_eq!(
            split_pr_arg(vec!["12".into(), "LGTM".into()]),
            (Some(12), Some("LGTM".into()))
        );
        assert_eq!(split_pr_arg(vec!["LGTM".into()]), (None, Some("LGTM".into())));
        assert_eq!(split_pr_arg(vec![]), (None, None));
    }

    #[test]
    fn dry_run_plan_lists_both_kinds() {
        let plan = SubmissionPlan {
            review: Some(ReviewPlan {
                body: "Overall fine".into(),
                event: ReviewEvent::RequestChanges,
                comments: vec![ReviewCommentInput {
                    path: "src/x.go".into(),
                    line: 15,
                    start_line: Some(10),
                    body: "fix".into(),
                    side: Side::Right,
                    start_side: Some(Side::Right),
                }],
            }),
            issue_comments: vec![IssueComment {
                body: "general".into(),
            }],
        };
        let text = format_plan(&plan, &RepoRef::new("octo", "widgets"), 3);
        assert!(text.starts_with("Would submit to octo/widgets PR #3:"));
        assert!(text.contains("1 issue comment(s)"));
        assert!(text.contains("Review (REQUEST_CHANGES) with 1 review comment(s)"));
        assert!(text.contains("1. src/x.go:10-15 - fix"));
    }

    #[test]
    fn truncate_flattens_and_shortens() {
        assert_eq!(truncate("a\nb", 10), "a b");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn lines_output_covers_all_cases() {
        let mut index = core::diff_index::DiffIndex::default();
        index.insert("test.go", [42, 43, 50]);
        index.insert("logo.png", Vec::new());

        let found = format_lines(&index, 7, "test.go");
        assert!(found.contains("Ranges: 42-43, 50"));
        assert!(found.contains("Lines:  42, 43, 50"));

        assert!(format_lines(&index, 7, "logo.png").contains("No commentable lines"));

        let missing = format_lines(&index, 7, "nope.go");
        assert!(missing.contains("not part of PR #7's diff"));
        assert!(missing.contains("  • test.go"));
    }

    #[test]
    fn reply_action_requires_something_to_do() {
        assert!(ReplyAction::new(None, None, None, false).is_err());
        assert!(ReplyAction::new(None, Some("+1".into()), Some("-1".into()), false).is_err());
        assert!(ReplyAction::new(None, Some("party".into()), None, false).is_err());

        let action = ReplyAction::new(Some("thanks".into()), Some("heart".into()), None, true).unwrap();
        assert_eq!(action.reaction, Some(Reaction::Heart));
        assert!(action.resolve);
    }

    #[test]
    fn add_arguments_cover_line_range_and_issue() {
        let (pr, request) = parse_add_args(
            vec!["12".into(), "src/api.js".into(), "42".into(), "check this".into()],
            &[],
            CommentKind::Review,
        )
        .unwrap();
        assert_eq!(pr, Some(12));
        assert_eq!(request, CommentRequest::review("src/api.js", 42, "check this"));

        let (pr, request) = parse_add_args(
            vec!["src/api.js".into(), "42:45".into()],
            &["First".into(), "Second".into()],
            CommentKind::Review,
        )
        .unwrap();
        assert_eq!(pr, None);
        assert_eq!(
            request,
            CommentRequest::review_range("src/api.js", "42-45", "First\nSecond")
        );

        let (pr, request) =
            parse_add_args(vec!["7".into(), "Thanks!".into()], &[], CommentKind::Issue).unwrap();
        assert_eq!(pr, Some(7));
        assert_eq!(request, CommentRequest::issue("Thanks!"));

        let (pr, request) =
            parse_add_args(vec![], &["general".into()], CommentKind::Issue).unwrap();
        assert_eq!(pr, None);
        assert_eq!(request.message, "general");
    }

    #[test]
    fn add_rejects_bad_arguments() {
        assert!(parse_add_args(vec!["a.go".into()], &[], CommentKind::Review).is_err());
        assert!(parse_add_args(
            vec!["x".into(), "a.go".into(), "3".into(), "m".into()],
            &[],
            CommentKind::Review
        )
        .is_err());
        let err = parse_add_args(vec!["a.go".into(), "four".into(), "m".into()], &[], CommentKind::Review)
            .unwrap_err();
        assert!(err.to_string().contains("invalid line number: four"));
    }

    #[test]
    fn cli_parses_export_fields() {
        let cli = Cli::try_parse_from([
            "ghcomment",
            "export",
            "9",
            "-f",
            "csv",
            "--include",
            "id,author,body",
            "-o",
            "out.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Export {
                number,
                format,
                output,
                include,
                include_resolved,
            } => {
                assert_eq!(number, Some(9));
                assert_eq!(format, "csv");
                assert_eq!(output, Some(PathBuf::from("out.csv")));
                assert_eq!(include, vec!["id", "author", "body"]);
                assert!(!include_resolved);
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn cli_parses_review_comments() {
        let cli = Cli::try_parse_from([
            "ghcomment",
            "review",
            "12",
            "Looks good",
            "--comment",
            "src/x.go:10-15:fix",
            "-c",
            "a.go:3:nit",
            "--event",
            "APPROVE",
        ])
        .unwrap();
        match cli.command {
            Commands::Review {
                args,
                comments,
                event,
            } => {
                assert_eq!(args, vec!["12", "Looks good"]);
                assert_eq!(comments.len(), 2);
                assert_eq!(event.as_deref(), Some("APPROVE"));
            }
            _ => panic!("expected review command"),
        }
    }
}
