//! 命令定义与解析

use std::fmt::Write as _;

use dns_failover_core::types::{Access, DomainField, ForwardField};
use thiserror::Error;

use super::client::BotCommand;

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    Public,
    Admin,
    SuperAdmin,
}

impl Permission {
    pub fn allows(self, access: Access) -> bool {
        match self {
            Self::Public => true,
            Self::Admin => access.is_active(),
            Self::SuperAdmin => access == Access::SuperAdmin,
        }
    }
}

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub permission: Permission,
}

const fn spec(
    name: &'static str,
    usage: &'static str,
    description: &'static str,
    permission: Permission,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        description,
        permission,
    }
}

/// Help order; also registered with `setMyCommands`.
pub const COMMANDS: &[CommandSpec] = &[
    spec("start", "", "Start the bot", Permission::Public),
    spec("id", "", "Show your Telegram id and request access", Permission::Public),
    spec("help", "", "List available commands", Permission::Admin),
    spec("me", "", "Show your admin profile", Permission::Admin),
    spec("list_domains", "", "List managed domains", Permission::Admin),
    spec("domain", "<id>", "Show a domain and its forwards", Permission::Admin),
    spec("toggle_check", "<id>", "Enable or disable checking for a domain", Permission::Admin),
    spec(
        "edit_domain",
        "<id> <name|port|sort> <value>",
        "Edit a domain field",
        Permission::Admin,
    ),
    spec("delete_domain", "<id>", "Delete a domain and its forwards", Permission::Admin),
    spec(
        "add_forward",
        "<domain_id> <forward|ip|isp|weight|sort|type>",
        "Add a forward to a domain",
        Permission::Admin,
    ),
    spec(
        "edit_forward",
        "<id> <domain|ip|isp|weight|sort|type> <value>",
        "Edit a forward field",
        Permission::Admin,
    ),
    spec("ban_forward", "<id>", "Ban a forward for a year, or lift its ban", Permission::Admin),
    spec("delete_forward", "<id>", "Delete a forward", Permission::Admin),
    spec(
        "check_forward",
        "<id>",
        "Probe a forward and switch DNS to it if reachable",
        Permission::Admin,
    ),
    spec("get_ip", "<id>", "Resolve and store a forward's IP", Permission::Admin),
    spec("manual_check", "", "Run a full check and failover now", Permission::Admin),
    spec(
        "upload_domains",
        "<lines>",
        "Bulk import domain|port|is_disable|sort|forward|ip|isp|is_ban|weight|forward_sort|type",
        Permission::Admin,
    ),
    spec("export", "", "Export all domains and forwards", Permission::Admin),
    spec("list_admins", "", "List admins", Permission::SuperAdmin),
    spec("ban_admin", "<uid>", "Ban an admin", Permission::SuperAdmin),
    spec("unban_admin", "<uid>", "Approve or unban an admin", Permission::SuperAdmin),
    spec("delete_admin", "<uid>", "Delete an admin", Permission::SuperAdmin),
    spec("remark_admin", "<uid> <text>", "Set an admin's remark", Permission::SuperAdmin),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Id,
    Help,
    Me,
    ListDomains,
    Domain(i64),
    ToggleCheck(i64),
    EditDomain {
        id: i64,
        field: DomainField,
        value: String,
    },
    DeleteDomain(i64),
    AddForward {
        domain_id: i64,
        line: String,
    },
    EditForward {
        id: i64,
        field: ForwardField,
        value: String,
    },
    BanForward(i64),
    DeleteForward(i64),
    CheckForward(i64),
    GetIp(i64),
    ManualCheck,
    UploadDomains(String),
    Export,
    ListAdmins,
    BanAdmin(i64),
    UnbanAdmin(i64),
    DeleteAdmin(i64),
    RemarkAdmin {
        uid: i64,
        remark: String,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command /{0}, see /help")]
    Unknown(String),

    #[error("Usage: /{name} {usage}")]
    Usage {
        name: &'static str,
        usage: &'static str,
    },

    #[error("{0}")]
    InvalidArgument(String),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Id => "id",
            Self::Help => "help",
            Self::Me => "me",
            Self::ListDomains => "list_domains",
            Self::Domain(_) => "domain",
            Self::ToggleCheck(_) => "toggle_check",
            Self::EditDomain { .. } => "edit_domain",
            Self::DeleteDomain(_) => "delete_domain",
            Self::AddForward { .. } => "add_forward",
            Self::EditForward { .. } => "edit_forward",
            Self::BanForward(_) => "ban_forward",
            Self::DeleteForward(_) => "delete_forward",
            Self::CheckForward(_) => "check_forward",
            Self::GetIp(_) => "get_ip",
            Self::ManualCheck => "manual_check",
            Self::UploadDomains(_) => "upload_domains",
            Self::Export => "export",
            Self::ListAdmins => "list_admins",
            Self::BanAdmin(_) => "ban_admin",
            Self::UnbanAdmin(_) => "unban_admin",
            Self::DeleteAdmin(_) => "delete_admin",
            Self::RemarkAdmin { .. } => "remark_admin",
        }
    }

    pub fn permission(&self) -> Permission {
        find_spec(self.name()).map_or(Permission::SuperAdmin, |s| s.permission)
    }
}

fn find_spec(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|s| s.name == name)
}

/// Split off the first whitespace-delimited token.
fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

struct Args<'a> {
    spec: &'static CommandSpec,
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn usage(&self) -> CommandError {
        CommandError::Usage {
            name: self.spec.name,
            usage: self.spec.usage,
        }
    }

    fn id(&mut self) -> Result<i64, CommandError> {
        let (token, rest) = split_first(self.rest);
        if token.is_empty() {
            return Err(self.usage());
        }
        self.rest = rest;
        token
            .parse()
            .map_err(|_| CommandError::InvalidArgument(format!("'{token}' is not a valid id")))
    }

    fn word(&mut self) -> Result<&'a str, CommandError> {
        let (token, rest) = split_first(self.rest);
        if token.is_empty() {
            return Err(self.usage());
        }
        self.rest = rest;
        Ok(token)
    }

    /// Everything left, trimmed; must not be empty.
    fn text(&self) -> Result<String, CommandError> {
        let text = self.rest.trim();
        if text.is_empty() {
            return Err(self.usage());
        }
        Ok(text.to_string())
    }
}

/// Parse a message text.
///
/// Returns `None` for plain text and for commands addressed to another bot
/// (`/cmd@other_bot`).
pub fn parse(text: &str, bot_username: &str) -> Option<Result<Command, CommandError>> {
    let text = text.trim_start();
    let body = text.strip_prefix('/')?;
    let (head, rest) = split_first(body);
    let name = match head.split_once('@') {
        Some((name, target)) if !target.eq_ignore_ascii_case(bot_username) => {
            tracing::debug!("Ignoring /{name} addressed to @{target}");
            return None;
        }
        Some((name, _)) => name,
        None => head,
    };
    let name = name.to_ascii_lowercase();

    let Some(spec) = find_spec(&name) else {
        return Some(Err(CommandError::Unknown(name)));
    };
    Some(parse_args(Args { spec, rest }))
}

fn parse_args(mut args: Args<'_>) -> Result<Command, CommandError> {
    let command = match args.spec.name {
        "start" => Command::Start,
        "id" => Command::Id,
        "help" => Command::Help,
        "me" => Command::Me,
        "list_domains" => Command::ListDomains,
        "domain" => Command::Domain(args.id()?),
        "toggle_check" => Command::ToggleCheck(args.id()?),
        "edit_domain" => {
            let id = args.id()?;
            let field = args
                .word()?
                .parse::<DomainField>()
                .map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
            Command::EditDomain {
                id,
                field,
                value: args.text()?,
            }
        }
        "delete_domain" => Command::DeleteDomain(args.id()?),
        "add_forward" => Command::AddForward {
            domain_id: args.id()?,
            line: args.text()?,
        },
        "edit_forward" => {
            let id = args.id()?;
            let field = args
                .word()?
                .parse::<ForwardField>()
                .map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
            Command::EditForward {
                id,
                field,
                value: args.text()?,
            }
        }
        "ban_forward" => Command::BanForward(args.id()?),
        "delete_forward" => Command::DeleteForward(args.id()?),
        "check_forward" => Command::CheckForward(args.id()?),
        "get_ip" => Command::GetIp(args.id()?),
        "manual_check" => Command::ManualCheck,
        "upload_domains" => Command::UploadDomains(args.text()?),
        "export" => Command::Export,
        "list_admins" => Command::ListAdmins,
        "ban_admin" => Command::BanAdmin(args.id()?),
        "unban_admin" => Command::UnbanAdmin(args.id()?),
        "delete_admin" => Command::DeleteAdmin(args.id()?),
        "remark_admin" => Command::RemarkAdmin {
            uid: args.id()?,
            remark: args.text()?,
        },
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Help text listing what `access` may run.
pub fn help_text(access: Access) -> String {
    let mut out = String::from("🤖 Available commands\n\n");
    for spec in COMMANDS.iter().filter(|s| s.permission.allows(access)) {
        if spec.usage.is_empty() {
            let _ = writeln!(out, "/{} - {}", spec.name, spec.description);
        } else {
            let _ = writeln!(out, "/{} {} - {}", spec.name, spec.usage, spec.description);
        }
    }
    out
}

/// Menu entries for `setMyCommands`. Super-admin commands stay off the menu.
pub fn menu() -> Vec<BotCommand> {
    COMMANDS
        .iter()
        .filter(|s| s.permission != Permission::SuperAdmin)
        .map(|s| BotCommand {
            command: s.name.to_string(),
            description: s.description.to_string(),
        })
        .collect()
}
