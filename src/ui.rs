// UI layer: terminal output helpers and the interactive menu built on
// `dialoguer`. Flows are small and synchronous; each one delegates to the
// library modules and prints what came back.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use rand::thread_rng;

use crate::api::ApiClient;
use crate::cleanup::{CleanupStats, CleanupSummary, DataCleanup};
use crate::config::Config;
use crate::generator::VmDataGenerator;
use crate::models::{add_vms_to_users, User, VirtualMachine};
use crate::report::{all_formats, ReportService, ReportWriter};

/// A ticking spinner with a message. Call `finish_and_clear` when done.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn failure(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_vms(vms: &[VirtualMachine]) {
    println!(
        "{}",
        format!(
            "{:>6}  {:<22} {:<22} {:>4} {:>6} {:>7}  {:<12} {:>6}",
            "ID", "NAME", "OS", "CPU", "RAM", "DISK", "STATUS", "OWNER"
        )
        .bold()
    );
    for vm in vms {
        println!(
            "{:>6}  {:<22} {:<22} {:>4} {:>5}G {:>6}G  {:<12} {:>6}",
            vm.id, vm.name, vm.operating_system, vm.cpu_cores, vm.ram_gb, vm.disk_gb, vm.status, vm.user_id
        );
    }
    println!("{} VM(s)", vms.len());
}

pub fn print_users(users: &[User]) {
    for user in users {
        println!(
            "{} {} <{}>  created {}",
            format!("#{}", user.id).bold(),
            user.name,
            user.email,
            user.created_at.format("%Y-%m-%d")
        );
        for vm in &user.vms {
            println!("    - {} ({}, {}) {}", vm.name, vm.operating_system, vm.status, format!("#{}", vm.id).dim());
        }
    }
    let with_vms = users.iter().filter(|u| !u.vms.is_empty()).count();
    println!("{} user(s), {} with VMs", users.len(), with_vms);
}

fn print_stats(label: &str, stats: &CleanupStats, confirm: bool) {
    if confirm {
        println!("{label}: {} found, {} deleted, {} failed", stats.total, stats.deleted, stats.failed);
    } else {
        println!("{label}: {} would be deleted", stats.total);
    }
}

pub fn print_cleanup(summary: &CleanupSummary, confirm: bool) {
    if !confirm {
        println!("{}", "Simulation only, nothing was deleted.".yellow());
    }
    print_stats("VMs", &summary.vms, confirm);
    print_stats("Users", &summary.users, confirm);
    if confirm {
        println!("Success rate: {:.1}%", summary.success_rate);
    }
}

/// Fetch users and VMs and join them.
pub fn users_with_vms(api: &ApiClient) -> crate::error::Result<Vec<User>> {
    let mut users = api.get_users()?;
    let vms = api.get_vms()?;
    add_vms_to_users(&mut users, &vms);
    Ok(users)
}

/// Main interactive menu. Runs a select loop until the user picks "Exit".
/// Actions that write to the backend authenticate on first use.
pub fn main_menu(mut api: ApiClient, config: &Config) -> Result<()> {
    let items = [
        "List users",
        "List VMs",
        "Create random VM",
        "Stop VM",
        "Generate reports",
        "Cleanup preview",
        "Exit",
    ];
    loop {
        let selection = Select::new().items(&items[..]).default(0).interact()?;
        let outcome = match selection {
            0 => users_with_vms(&api).map(|users| print_users(&users)),
            1 => api.get_vms().map(|vms| print_vms(&vms)),
            2 => handle_create_vm(&mut api, config),
            3 => handle_stop_vm(&mut api, config),
            4 => handle_reports(&api),
            5 => DataCleanup::new(&api)
                .cleanup_everything(false)
                .map(|summary| print_cleanup(&summary, false)),
            _ => break,
        };
        if let Err(e) = outcome {
            failure(&e.to_string());
        }
    }
    Ok(())
}

fn ensure_token(api: &mut ApiClient, config: &Config) -> crate::error::Result<()> {
    if !api.has_token() {
        crate::cli::authenticate(api, config, None, None, true)?;
    }
    Ok(())
}

fn handle_create_vm(api: &mut ApiClient, config: &Config) -> crate::error::Result<()> {
    ensure_token(api, config)?;
    let user_id: i64 = Input::new()
        .with_prompt("Owner user id")
        .interact_text()
        .map_err(|e| crate::error::Error::Prompt(e.to_string()))?;
    let draft = VmDataGenerator::new(thread_rng()).generate_new_vm(user_id);
    let pb = spinner("Creating VM...");
    let result = api.create_vm(&draft);
    pb.finish_and_clear();
    let vm = result?;
    success(&format!("created VM #{} {} ({})", vm.id, vm.name, vm.operating_system));
    Ok(())
}

fn handle_stop_vm(api: &mut ApiClient, config: &Config) -> crate::error::Result<()> {
    ensure_token(api, config)?;
    let vm_id: i64 = Input::new()
        .with_prompt("VM id")
        .interact_text()
        .map_err(|e| crate::error::Error::Prompt(e.to_string()))?;
    let confirmed = Confirm::new()
        .with_prompt(format!("Stop VM #{vm_id}?"))
        .interact()
        .map_err(|e| crate::error::Error::Prompt(e.to_string()))?;
    if confirmed {
        api.stop_vm(vm_id)?;
        success(&format!("stop requested for VM #{vm_id}"));
    }
    Ok(())
}

fn handle_reports(api: &ApiClient) -> crate::error::Result<()> {
    let dir: String = Input::new()
        .with_prompt("Output directory")
        .default("outputs".to_string())
        .interact_text()
        .map_err(|e| crate::error::Error::Prompt(e.to_string()))?;
    let service = ReportService::new(api, ReportWriter::new(PathBuf::from(dir)));
    let formats = all_formats();
    let pb = spinner("Generating reports...");
    let written = service.generate_users_vms(&formats, "users_vms_report");
    pb.finish_and_clear();
    match written? {
        Some(paths) => paths.iter().for_each(|p| success(&p.display().to_string())),
        None => println!("{}", "No data to report.".yellow()),
    }
    Ok(())
}
