use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use aqi_api::password::{hash_password, validate_password, validate_username};
use aqi_api::settings::MAINTENANCE_KEY;
use aqi_db::Database;
use aqi_types::models::Role;

/// Name written to the activity log for changes made from this tool.
const ACTOR: &str = "aqi-admin";

#[derive(Parser, Debug)]
#[command(name = "aqi-admin")]
#[command(about = "Offline maintenance for the AQI dashboard store")]
struct Cli {
    /// SQLite database path (also read from `AQI_DB_PATH`).
    #[arg(long, env = "AQI_DB_PATH", default_value = "aqi.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Users(Users),
    /// Turn maintenance mode on or off.
    Maintenance {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

#[derive(Args, Debug)]
struct Users {
    #[command(subcommand)]
    command: UsersCommand,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// Print every account.
    List,
    Create(CreateArgs),
    SetRole {
        username: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Delete every account.
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "AQI_NEW_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, value_parser = parse_role, default_value = "user")]
    role: Role,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse().map_err(|e| format!("{e}"))
}

/// Best effort: the change itself is already committed.
fn audit(db: &Database, action: &str) {
    if let Err(e) = db.insert_activity(ACTOR, action) {
        warn!("Failed to record activity '{}': {}", action, e);
    }
}

fn list_users(db: &Database) -> anyhow::Result<String> {
    let users = db.list_users()?;
    let mut out = format!(
        "{:<32} {:<6} {:<10} {}\n",
        "USERNAME", "ROLE", "SUBSCRIBED", "CREATED"
    );
    for user in &users {
        out.push_str(&format!(
            "{:<32} {:<6} {:<10} {}\n",
            user.username,
            user.role.as_str(),
            if user.subscription { "yes" } else { "no" },
            user.created_at
        ));
    }
    out.push_str(&format!("{} user(s)\n", users.len()));
    Ok(out)
}

fn create_user(db: &Database, args: &CreateArgs) -> anyhow::Result<String> {
    validate_username(&args.username)?;
    validate_password(&args.password)?;

    let hash = hash_password(&args.password)?;
    if !db.create_user(&args.username, &hash, args.role)? {
        bail!("user '{}' already exists", args.username);
    }
    audit(db, &format!("Created user {} ({})", args.username, args.role));
    Ok(format!("Created {} '{}'", args.role, args.username))
}

fn set_role(db: &Database, username: &str, role: Role) -> anyhow::Result<String> {
    let demoting = role != Role::Admin && db.get_user(username)?.is_some_and(|u| u.role.is_admin());
    if demoting && db.count_admins()? <= 1 {
        bail!("refusing to demote the last admin");
    }
    if !db.update_role(username, role)? {
        bail!("user '{}' not found", username);
    }
    audit(db, &format!("Changed role of {} to {}", username, role));
    Ok(format!("'{}' is now {}", username, role))
}

fn reset_users(db: &Database, yes: bool) -> anyhow::Result<String> {
    let count = db.list_users()?.len();
    if !yes {
        bail!("this would delete {} user(s); pass --yes to confirm", count);
    }
    let deleted = db.delete_all_users()?;
    audit(db, &format!("Deleted all users ({} accounts)", deleted));
    Ok(format!("Deleted {} user(s)", deleted))
}

fn set_maintenance(db: &Database, enabled: bool) -> anyhow::Result<String> {
    db.set_setting(MAINTENANCE_KEY, if enabled { "true" } else { "false" })?;
    audit(
        db,
        if enabled {
            "Enabled maintenance mode"
        } else {
            "Disabled maintenance mode"
        },
    );
    Ok(format!("Maintenance mode {}", if enabled { "on" } else { "off" }))
}

fn run(db: &Database, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Users(users) => match users.command {
            UsersCommand::List => list_users(db),
            UsersCommand::Create(args) => create_user(db, &args),
            UsersCommand::SetRole { username, role } => set_role(db, &username, role),
            UsersCommand::Reset { yes } => reset_users(db, yes),
        },
        Command::Maintenance { state } => set_maintenance(db, state == "on"),
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aqi=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::open(&cli.database)
        .with_context(|| format!("opening {}", cli.database.display()))?;
    info!("Using database {}", cli.database.display());

    let output = run(&db, cli.command)?;
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn create(db: &Database, username: &str, role: Role) {
        create_user(
            db,
            &CreateArgs {
                username: username.into(),
                password: "pw1-pass".into(),
                role,
            },
        )
        .unwrap();
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["aqi-admin", "--database", "x.db", "users", "set-role", "bob", "admin"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Users(Users {
                command: UsersCommand::SetRole { role: Role::Admin, .. }
            })
        ));
        assert!(Cli::try_parse_from(["aqi-admin", "maintenance", "maybe"]).is_err());
        assert!(Cli::try_parse_from(["aqi-admin", "users", "set-role", "bob", "root"]).is_err());
    }

    #[test]
    fn create_and_list() {
        let db = db();
        create(&db, "alice", Role::User);
        create(&db, "root", Role::Admin);
        assert!(create_user(
            &db,
            &CreateArgs {
                username: "alice".into(),
                password: "pw1-pass".into(),
                role: Role::User,
            }
        )
        .is_err());

        let out = list_users(&db).unwrap();
        assert!(out.contains("alice"));
        assert!(out.contains("2 user(s)"));
        assert!(db.get_user("alice").unwrap().unwrap().password.starts_with("$argon2"));
    }

    #[test]
    fn set_role_keeps_one_admin() {
        let db = db();
        create(&db, "root", Role::Admin);
        create(&db, "bob", Role::User);

        assert!(set_role(&db, "root", Role::User).is_err());
        set_role(&db, "bob", Role::Admin).unwrap();
        set_role(&db, "root", Role::User).unwrap();
        assert_eq!(db.count_admins().unwrap(), 1);
        assert!(set_role(&db, "ghost", Role::Admin).is_err());
    }

    #[test]
    fn reset_requires_confirmation() {
        let db = db();
        create(&db, "alice", Role::User);

        assert!(reset_users(&db, false).is_err());
        assert_eq!(db.list_users().unwrap().len(), 1);

        assert_eq!(reset_users(&db, true).unwrap(), "Deleted 1 user(s)");
        assert!(db.list_users().unwrap().is_empty());
        let log = db.list_activity().unwrap();
        assert_eq!(log[0].action, "Deleted all users (1 accounts)");
        assert_eq!(log[0].username, ACTOR);
    }

    #[test]
    fn maintenance_toggle() {
        let db = db();
        set_maintenance(&db, true).unwrap();
        assert_eq!(db.get_setting(MAINTENANCE_KEY).unwrap().as_deref(), Some("true"));
        set_maintenance(&db, false).unwrap();
        assert_eq!(db.get_setting(MAINTENANCE_KEY).unwrap().as_deref(), Some("false"));
    }

    #[test]
    fn audit_failure_does_not_fail_the_command() {
        let db = db();
        db.with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER block_activity BEFORE INSERT ON activity_logs
                 BEGIN SELECT RAISE(ABORT, 'log unavailable'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(set_maintenance(&db, true).unwrap(), "Maintenance mode on");
        assert_eq!(db.get_setting(MAINTENANCE_KEY).unwrap().as_deref(), Some("true"));
        assert!(db.list_activity().unwrap().is_empty());
    }
}
