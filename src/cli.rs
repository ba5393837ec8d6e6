// Command-line surface: clap definitions plus one small handler per
// subcommand. Handlers return `anyhow::Result` and print human output; the
// library modules do the actual work.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use rand::rngs::StdRng;
use rand::{thread_rng, SeedableRng};
use tracing::info;

use crate::api::{ApiClient, AuthApi};
use crate::archive;
use crate::cleanup::DataCleanup;
use crate::config::{Config, TOKEN_ENV_VAR};
use crate::credentials::CredentialProvider;
use crate::generator::{DataGenerator, UserDataGenerator, VmDataGenerator};
use crate::models::VmStatus;
use crate::populate::{self, BatchOptions};
use crate::report::{all_formats, HtmlReport, JsonReport, MarkdownReport, ReportFormat, ReportService, ReportWriter};
use crate::token::{get_or_create_token, EnvFileTokenStore};
use crate::ui;

/// Manage users and virtual machines on the demo backend.
#[derive(Debug, Parser)]
#[command(name = "vmfleet", version, about)]
pub struct Cli {
    /// Override the API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Account email used when a token must be obtained
    #[arg(long, global = true)]
    pub login_email: Option<String>,

    /// Account password used when a token must be obtained
    #[arg(long, global = true)]
    pub login_password: Option<String>,

    /// Never prompt; fail when credentials are missing
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List users with their VMs
    Users,
    /// List VMs
    Vms,
    /// Authenticate and show the current account
    Whoami,
    /// VM operations
    #[command(subcommand)]
    Vm(VmCommand),
    /// User operations
    #[command(subcommand)]
    User(UserCommand),
    /// Create generated users and VMs through the API
    Populate(PopulateArgs),
    /// Write an offline synthetic dataset as JSON
    Generate(GenerateArgs),
    /// Write reports from live data
    Report(ReportArgs),
    /// Delete every VM and user (simulated unless --confirm)
    Cleanup(CleanupArgs),
    /// Bundle files from a directory
    Archive(ArchiveArgs),
    /// Show the effective configuration
    Config,
    /// Interactive menu
    Interactive,
}

#[derive(Debug, Subcommand)]
pub enum VmCommand {
    /// Create a VM; omitted fields are generated
    Create(VmCreateArgs),
    /// Attach a VM to a user
    Attach {
        #[arg(long)]
        vm_id: i64,
        #[arg(long)]
        user_id: i64,
    },
    /// Stop a VM
    Stop {
        #[arg(long)]
        vm_id: i64,
    },
    /// Delete a VM
    Delete {
        #[arg(long)]
        vm_id: i64,
    },
}

#[derive(Debug, Args)]
pub struct VmCreateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "os")]
    pub operating_system: Option<String>,
    #[arg(long)]
    pub cores: Option<u32>,
    /// RAM in GB
    #[arg(long)]
    pub ram: Option<u32>,
    /// Disk in GB
    #[arg(long)]
    pub disk: Option<u32>,
    #[arg(long)]
    pub status: Option<VmStatus>,
    /// Owner; defaults to the authenticated account
    #[arg(long)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete a user
    Delete {
        #[arg(long)]
        user_id: i64,
    },
}

#[derive(Debug, Args)]
pub struct PopulateArgs {
    #[arg(long, default_value_t = 10)]
    pub users: usize,
    #[arg(long, default_value_t = 20)]
    pub vms: usize,
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,
    /// Seconds between batches
    #[arg(long, default_value_t = 0.5)]
    pub delay: f64,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 10)]
    pub users: usize,
    #[arg(long, default_value_t = 1)]
    pub min_vms: usize,
    #[arg(long, default_value_t = 3)]
    pub max_vms: usize,
    /// Defaults to the configured output file
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Seed for a reproducible dataset
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    UsersVms,
    Status,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormatChoice {
    Json,
    Markdown,
    Html,
    All,
}

impl ReportFormatChoice {
    fn formats(self) -> Vec<Box<dyn ReportFormat>> {
        match self {
            Self::Json => vec![Box::new(JsonReport)],
            Self::Markdown => vec![Box::new(MarkdownReport)],
            Self::Html => vec![Box::new(HtmlReport)],
            Self::All => all_formats(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[arg(long = "type", value_enum, default_value_t = ReportKind::All)]
    pub kind: ReportKind,
    #[arg(long, value_enum, default_value_t = ReportFormatChoice::All)]
    pub format: ReportFormatChoice,
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Actually delete
    #[arg(long)]
    pub confirm: bool,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    List,
}

impl ArchiveFormat {
    fn default_output(self) -> &'static str {
        match self {
            Self::Zip => "archive.zip",
            Self::TarGz => "archive.tar.gz",
            Self::List => "file_list.txt",
        }
    }
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
    /// Keep only this extension
    #[arg(long)]
    pub ext: Option<String>,
    /// Keep only files whose stem is shorter than this
    #[arg(long)]
    pub max_stem: Option<usize>,
    #[arg(long, value_enum, default_value_t = ArchiveFormat::Zip)]
    pub format: ArchiveFormat,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Obtain a token (cached, signup or login) and install it on `api`.
pub fn authenticate(
    api: &mut ApiClient,
    config: &Config,
    email: Option<String>,
    password: Option<String>,
    interactive: bool,
) -> crate::error::Result<String> {
    let store = EnvFileTokenStore::new(TOKEN_ENV_VAR, ".env");
    let provider = CredentialProvider::standard(
        email.or_else(|| config.email.clone()),
        password.or_else(|| config.password.clone()),
        interactive,
    );
    let token = get_or_create_token(&*api, &store, || provider.resolve().map(|r| r.credentials))?;
    api.set_token(&token);
    Ok(token)
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli, config: Config) -> Result<()> {
    let mut api = ApiClient::new(&config)?;
    let interactive = !cli.non_interactive;
    let email = cli.login_email;
    let password = cli.login_password;
    let login = |api: &mut ApiClient| authenticate(api, &config, email.clone(), password.clone(), interactive);

    match cli.command {
        Commands::Users => {
            let users = ui::users_with_vms(&api)?;
            ui::print_users(&users);
        }
        Commands::Vms => ui::print_vms(&api.get_vms()?),
        Commands::Whoami => {
            let token = login(&mut api)?;
            let account = api.me(&token)?;
            println!("#{} {} <{}>", account.id, account.name, account.email);
        }
        Commands::Vm(command) => {
            let token = login(&mut api)?;
            run_vm(&api, &token, command)?;
        }
        Commands::User(UserCommand::Create { name, email, password }) => {
            let user = api.create_user(&name, &email, password.as_deref())?;
            ui::success(&format!("created user #{} {} <{}>", user.id, user.name, user.email));
        }
        Commands::User(UserCommand::Delete { user_id }) => {
            login(&mut api)?;
            api.delete_user(user_id)?;
            ui::success(&format!("deleted user #{user_id}"));
        }
        Commands::Populate(args) => {
            login(&mut api)?;
            run_populate(&api, &args)?;
        }
        Commands::Generate(args) => run_generate(&config, &args)?,
        Commands::Report(args) => run_report(&api, &args)?,
        Commands::Cleanup(args) => {
            if args.confirm {
                if !args.yes && !confirm_cleanup(interactive)? {
                    println!("Aborted.");
                    return Ok(());
                }
                login(&mut api)?;
            }
            let summary = DataCleanup::new(&api).cleanup_everything(args.confirm)?;
            ui::print_cleanup(&summary, args.confirm);
        }
        Commands::Archive(args) => run_archive(&args)?,
        Commands::Config => {
            for (key, value) in config.summary() {
                println!("{key:<18} {value}");
            }
        }
        Commands::Interactive => ui::main_menu(api, &config)?,
    }
    Ok(())
}

fn run_vm(api: &ApiClient, token: &str, command: VmCommand) -> Result<()> {
    match command {
        VmCommand::Create(args) => {
            let user_id = match args.user_id {
                Some(id) => id,
                None => api.me(token)?.id,
            };
            let mut draft = VmDataGenerator::new(thread_rng()).generate_new_vm(user_id);
            if let Some(name) = args.name {
                draft.name = name;
            }
            if let Some(os) = args.operating_system {
                draft.operating_system = os;
            }
            draft.cpu_cores = args.cores.unwrap_or(draft.cpu_cores);
            draft.ram_gb = args.ram.unwrap_or(draft.ram_gb);
            draft.disk_gb = args.disk.unwrap_or(draft.disk_gb);
            draft.status = args.status.unwrap_or(draft.status);
            let pb = ui::spinner("Creating VM...");
            let result = api.create_vm(&draft);
            pb.finish_and_clear();
            let vm = result?;
            ui::success(&format!("created VM #{} {} for user #{}", vm.id, vm.name, vm.user_id));
        }
        VmCommand::Attach { vm_id, user_id } => {
            let answer = api.attach_vm_to_user(vm_id, user_id)?;
            ui::success(&format!("VM #{vm_id} attached to user #{user_id}"));
            if !answer.is_null() {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            }
        }
        VmCommand::Stop { vm_id } => {
            api.stop_vm(vm_id)?;
            ui::success(&format!("stop requested for VM #{vm_id}"));
        }
        VmCommand::Delete { vm_id } => {
            api.delete_vm(vm_id)?;
            ui::success(&format!("deleted VM #{vm_id}"));
        }
    }
    Ok(())
}

fn run_populate(api: &ApiClient, args: &PopulateArgs) -> Result<()> {
    if !args.delay.is_finite() || args.delay < 0.0 {
        bail!("--delay must be a non-negative number of seconds");
    }
    let opts = BatchOptions {
        batch_size: args.batch_size,
        delay: Duration::from_secs_f64(args.delay),
        show_progress: true,
    };

    let (users, user_stats) = populate::create_users(api, &mut UserDataGenerator::new(thread_rng()), args.users, &opts);
    let mut owner_ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    if owner_ids.is_empty() && args.vms > 0 {
        info!("no users created, using existing users as VM owners");
        owner_ids = api.get_users()?.iter().map(|u| u.id).collect();
    }

    let (_, vm_stats) = populate::create_vms(
        api,
        &mut VmDataGenerator::new(thread_rng()),
        &mut thread_rng(),
        args.vms,
        &owner_ids,
        &opts,
    );
    println!(
        "Users: {}/{} created, {} failed",
        user_stats.created, user_stats.requested, user_stats.failed
    );
    println!("VMs:   {}/{} created, {} failed", vm_stats.created, vm_stats.requested, vm_stats.failed);
    Ok(())
}

fn run_generate(config: &Config, args: &GenerateArgs) -> Result<()> {
    if args.min_vms > args.max_vms {
        bail!("--min-vms ({}) is greater than --max-vms ({})", args.min_vms, args.max_vms);
    }
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let users = DataGenerator::new(rng).generate_users_with_vms(args.users, args.min_vms..=args.max_vms);

    let output = args.output.clone().unwrap_or_else(|| config.output_file.clone());
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&users)?;
    fs::write(&output, json).with_context(|| format!("writing {}", output.display()))?;

    let vm_count: usize = users.iter().map(|u| u.vms.len()).sum();
    ui::success(&format!("{} users and {vm_count} VMs written to {}", users.len(), output.display()));
    Ok(())
}

fn run_report(api: &ApiClient, args: &ReportArgs) -> Result<()> {
    let service = ReportService::new(api, ReportWriter::new(&args.output_dir));
    let formats = args.format.formats();

    let pb = ui::spinner("Generating reports...");
    let mut written = Vec::new();
    let mut skipped = Vec::new();
    if matches!(args.kind, ReportKind::UsersVms | ReportKind::All) {
        match service.generate_users_vms(&formats, "users_vms_report")? {
            Some(paths) => written.extend(paths),
            None => skipped.push("users/VMs"),
        }
    }
    if matches!(args.kind, ReportKind::Status | ReportKind::All) {
        match service.generate_status(&formats, "vm_status_report")? {
            Some(paths) => written.extend(paths),
            None => skipped.push("status"),
        }
    }
    pb.finish_and_clear();

    for path in &written {
        ui::success(&path.display().to_string());
    }
    for kind in skipped {
        ui::failure(&format!("{kind} report skipped: no data"));
    }
    Ok(())
}

fn confirm_cleanup(interactive: bool) -> Result<bool> {
    if !interactive {
        bail!("--confirm without --yes needs a terminal; pass --yes to skip the prompt");
    }
    Ok(Confirm::new()
        .with_prompt("Delete ALL VMs and users? This cannot be undone")
        .default(false)
        .interact()?)
}

fn run_archive(args: &ArchiveArgs) -> Result<()> {
    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }
    let mut files = archive::get_all_files(&args.dir);
    if let Some(ext) = &args.ext {
        files = archive::filter_by_extension(&files, ext);
    }
    if let Some(max) = args.max_stem {
        files = archive::filter_short_named_files(&files, max);
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.format.default_output()));

    // The output may sit inside the scanned tree.
    let files = archive::exclude_path(&files, &output);
    archive::remove_existing(&output)?;
    match args.format {
        ArchiveFormat::Zip => archive::generate_zip_archive(&files, &output)?,
        ArchiveFormat::TarGz => archive::generate_tar_gz_archive(&files, &output)?,
        ArchiveFormat::List => archive::output_file_list(&files, &output)?,
    }
    ui::success(&format!("{} file(s) -> {}", files.len(), output.display()));
    Ok(())
}
