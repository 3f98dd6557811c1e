use purse_core::PayloadProtection;

use crate::cli::{ConfigCommands, ProtectionArg, RemoteKindArg};
use crate::commands::common::CommandContext;
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig, RemoteKind};
use crate::error::CliError;

/// Values given to `purse config init`
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub user_id: Option<String>,
    pub database: Option<String>,
    pub remote_kind: Option<RemoteKindArg>,
    pub remote: Option<String>,
    pub protection: Option<ProtectionArg>,
    pub restore_timeout: Option<u64>,
}

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    resolve_context: impl FnOnce() -> Result<CommandContext, CliError>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            user_id,
            database,
            remote_kind,
            remote,
            protection,
            restore_timeout,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdate {
                user_id,
                database,
                remote_kind,
                remote,
                protection,
                restore_timeout,
            },
            no_activate,
        ),
        ConfigCommands::Show => {
            run_config_show(&resolve_context()?);
            Ok(())
        }
    }
}

/// Merge explicit values over the existing profile.
pub fn apply_profile_update(profile: &mut CliProfile, update: ProfileUpdate) {
    if let Some(value) = normalize_text_option(update.user_id) {
        profile.user_id = Some(value);
    }
    if let Some(value) = normalize_text_option(update.database) {
        profile.db_path = Some(value);
    }
    if let Some(kind) = update.remote_kind {
        profile.remote_kind = match kind {
            RemoteKindArg::File => RemoteKind::File,
            RemoteKindArg::Http => RemoteKind::Http,
        };
    }
    if let Some(value) = normalize_text_option(update.remote) {
        profile.remote = Some(value);
    }
    if let Some(protection) = update.protection {
        profile.protection = match protection {
            ProtectionArg::Sealed => PayloadProtection::Sealed,
            ProtectionArg::Plaintext => PayloadProtection::Plaintext,
        };
    }
    if let Some(secs) = update.restore_timeout {
        profile.restore_timeout_secs = Some(secs);
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    apply_profile_update(profile, update);
    profile.validate().map_err(CliError::Config)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    if profile.user_id().is_none() {
        println!("Profile '{profile_name}' is missing: user_id");
    } else if profile.protection == PayloadProtection::Plaintext {
        println!("Backups for '{profile_name}' are stored unencrypted.");
    } else {
        println!(
            "Backups for '{profile_name}' are sealed. Set PURSE_IDENTITY_KEY or pass --identity-key."
        );
    }

    Ok(())
}

pub fn run_config_show(context: &CommandContext) {
    let profile = &context.profile;
    println!("Profile:    {}", context.profile_name);
    println!(
        "User id:    {}",
        profile.user_id().unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Database:   {}", context.db_path.display());
    let remote_kind = match profile.remote_kind {
        RemoteKind::File => "file",
        RemoteKind::Http => "http",
    };
    println!(
        "Remote:     {remote_kind} {}",
        profile.remote().unwrap_or_else(|| "(default)".to_string())
    );
    let protection = match profile.protection {
        PayloadProtection::Sealed => "sealed",
        PayloadProtection::Plaintext => "plaintext",
    };
    println!("Protection: {protection}");
    if let Some(secs) = profile.restore_timeout_secs {
        println!("Restore timeout: {secs}s");
    }
}
