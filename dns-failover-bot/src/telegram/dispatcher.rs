//! Routes incoming messages to services and replies in the same chat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dns_failover_app::AppState;
use dns_failover_core::services::{ForwardCheck, render_manual};
use dns_failover_core::types::{Access, CheckEventReceiver, ChatUser, Registration};
use dns_failover_core::{CoreError, CoreResult};
use tokio::sync::mpsc;

use super::client::{MESSAGE_LIMIT, TelegramClient, TelegramError, Update, User, split_message};
use super::commands::{self, Command, Permission};
use super::render::{self, ProgressView};

/// Minimum spacing between edits of a progress message.
const PROGRESS_EDIT_INTERVAL: Duration = Duration::from_secs(1);

fn delivery(e: TelegramError) -> CoreError {
    CoreError::NotificationError(e.to_string())
}

fn chat_user(user: &User) -> ChatUser {
    ChatUser {
        uid: user.id,
        username: user.username.clone().unwrap_or_default(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone().unwrap_or_default(),
    }
}

fn log_failure(command: &str, e: &CoreError) {
    if e.is_expected() {
        tracing::warn!(command, "Command rejected: {e}");
    } else {
        tracing::error!(command, "Command failed: {e}");
    }
}

/// A status message edited in place while a check runs.
struct StatusMessage<'a> {
    client: &'a TelegramClient,
    chat_id: i64,
    message_id: i64,
    last_edit: Instant,
    last_text: String,
}

impl<'a> StatusMessage<'a> {
    async fn open(
        client: &'a TelegramClient,
        chat_id: i64,
        text: &str,
    ) -> Result<Self, TelegramError> {
        let message = client.send_message(chat_id, text).await?;
        Ok(Self {
            client,
            chat_id,
            message_id: message.message_id,
            last_edit: Instant::now(),
            last_text: text.to_string(),
        })
    }

    /// Edit unless the text is unchanged or the last edit was too recent.
    async fn update(&mut self, text: String) {
        if text == self.last_text || self.last_edit.elapsed() < PROGRESS_EDIT_INTERVAL {
            return;
        }
        self.edit(text).await;
    }

    async fn edit(&mut self, text: String) {
        if let Err(e) = self
            .client
            .edit_message_text(self.chat_id, self.message_id, &text)
            .await
        {
            tracing::debug!("Progress edit failed: {e}");
        }
        self.last_edit = Instant::now();
        self.last_text = text;
    }

    /// Replace the status with the final text; overflow goes out as new messages.
    async fn finish(mut self, text: &str) {
        let mut chunks = split_message(text, MESSAGE_LIMIT).into_iter();
        if let Some(first) = chunks.next() {
            self.edit(first).await;
        }
        for chunk in chunks {
            if let Err(e) = self.client.send_message(self.chat_id, &chunk).await {
                tracing::warn!("Failed to send report part: {e}");
            }
        }
    }
}

async fn relay_progress(status: &mut StatusMessage<'_>, mut events: CheckEventReceiver, header: &str) {
    let mut view = ProgressView::new(header);
    while let Some(event) = events.recv().await {
        view.apply(&event);
        status.update(view.render()).await;
    }
}

pub struct Dispatcher {
    client: Arc<TelegramClient>,
    state: Arc<AppState>,
    bot_username: String,
}

impl Dispatcher {
    pub fn new(client: Arc<TelegramClient>, state: Arc<AppState>, bot_username: String) -> Self {
        Self {
            client,
            state,
            bot_username,
        }
    }

    pub async fn handle(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let (Some(text), Some(user)) = (message.text.as_deref(), message.from.as_ref()) else {
            return;
        };
        if user.is_bot {
            return;
        }
        let chat_id = message.chat.id;

        let command = match commands::parse(text, &self.bot_username) {
            None => return,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                tracing::debug!(uid = user.id, "Bad command: {e}");
                self.reply(chat_id, &format!("❌ {e}")).await;
                return;
            }
        };
        let name = command.name();
        tracing::info!(uid = user.id, chat_id, command = name, "Command received");

        match self.execute(chat_id, user, command).await {
            Ok(Some(reply)) => self.reply(chat_id, &reply).await,
            Ok(None) => {}
            Err(e) => {
                log_failure(name, &e);
                self.reply(chat_id, &format!("❌ {e}")).await;
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.client.send_message(chat_id, text).await {
            tracing::warn!(chat_id, "Failed to reply: {e}");
        }
    }

    async fn authorize(&self, uid: i64, permission: Permission) -> CoreResult<Access> {
        let access = self.state.admin_service.access(uid).await?;
        if permission.allows(access) {
            return Ok(access);
        }
        Err(CoreError::PermissionDenied(match (permission, access) {
            (_, Access::Banned) => "your account is banned or awaiting approval".to_string(),
            (Permission::SuperAdmin, _) => "only the super admin can do this".to_string(),
            _ => "send /id and ask the super admin for access".to_string(),
        }))
    }

    /// Run a command; `Ok(None)` means the reply was already sent.
    async fn execute(
        &self,
        chat_id: i64,
        user: &User,
        command: Command,
    ) -> CoreResult<Option<String>> {
        let permission = command.permission();
        let access = if permission == Permission::Public {
            Access::Unknown
        } else {
            self.authorize(user.id, permission).await?
        };

        let domains = &self.state.domain_service;
        let admins = &self.state.admin_service;
        let reply = match command {
            Command::Start => render::welcome(),
            Command::Id => self.register(user).await?,
            Command::Help => commands::help_text(access),
            Command::Me => {
                let admin = self.state.ctx.admin_repository.find(user.id).await?;
                render::admin_profile(admin.as_ref(), access, user.id)
            }
            Command::ListDomains => render::domain_list(&domains.list_domains().await?),
            Command::Domain(id) => render::domain_detail(&domains.get_domain(id).await?),
            Command::ToggleCheck(id) => {
                let domain = domains.toggle_check(id).await?;
                format!(
                    "✅ Checking {} for {}",
                    if domain.is_disable_check { "disabled" } else { "enabled" },
                    domain.address()
                )
            }
            Command::EditDomain { id, field, value } => {
                let edit = domains.edit_domain(id, field, &value).await?;
                let mut reply = format!("✅ {} {field} updated", edit.domain.address());
                if let Some(warning) = edit.warning {
                    reply.push_str("\n⚠️ ");
                    reply.push_str(&warning);
                }
                reply
            }
            Command::DeleteDomain(id) => {
                let domain = domains.delete_domain(id).await?;
                format!("🗑 Deleted {} and its forwards", domain.address())
            }
            Command::AddForward { domain_id, line } => {
                let forward = domains.add_forward(domain_id, &line).await?;
                format!("✅ Forward #{} {} added", forward.id, forward.forward_domain)
            }
            Command::EditForward { id, field, value } => {
                let forward = domains.edit_forward(id, field, &value).await?;
                format!("✅ {field} updated\n\n{}", render::forward_detail(&forward))
            }
            Command::BanForward(id) => {
                let forward = domains.toggle_forward_ban(id).await?;
                if forward.is_ban {
                    format!("🚫 {} banned for a year", forward.forward_domain)
                } else {
                    format!("✅ {} unbanned", forward.forward_domain)
                }
            }
            Command::DeleteForward(id) => {
                let forward = domains.delete_forward(id).await?;
                format!("🗑 Deleted forward {}", forward.forward_domain)
            }
            Command::CheckForward(id) => return self.check_forward(chat_id, id).await,
            Command::GetIp(id) => {
                let forward = domains.refresh_forward_ip(id).await?;
                format!("📍 {} → {}", forward.forward_domain, forward.ip)
            }
            Command::ManualCheck => return self.manual_check(chat_id).await,
            Command::UploadDomains(text) => {
                let summary = self.state.import_export_service.import(&text).await?;
                render::import_summary(&summary)
            }
            Command::Export => {
                let lines = self.state.import_export_service.export().await?;
                format!("📤 Export\n\n{lines}")
            }
            Command::ListAdmins => render::admin_list(&admins.list(user.id).await?),
            Command::BanAdmin(uid) => {
                let admin = admins.set_banned(user.id, uid, true).await?;
                format!("🚫 {} banned", admin.display_name())
            }
            Command::UnbanAdmin(uid) => {
                let admin = admins.set_banned(user.id, uid, false).await?;
                format!("✅ {} approved", admin.display_name())
            }
            Command::DeleteAdmin(uid) => {
                let admin = admins.delete(user.id, uid).await?;
                format!("🗑 {} deleted", admin.display_name())
            }
            Command::RemarkAdmin { uid, remark } => {
                let admin = admins.set_remark(user.id, uid, &remark).await?;
                format!("✅ Remark for {} set to {}", admin.display_name(), admin.remark)
            }
        };
        Ok(Some(reply))
    }

    /// `/id`: show the profile and file an access request for new users.
    async fn register(&self, user: &User) -> CoreResult<String> {
        let status = match self.state.admin_service.register(&chat_user(user)).await? {
            Registration::SuperAdmin => render::access_label(Access::SuperAdmin),
            Registration::Existing(admin) if admin.is_ban => render::access_label(Access::Banned),
            Registration::Existing(_) => render::access_label(Access::Admin),
            Registration::Pending(admin) => {
                self.announce_request(&admin.display_name(), admin.uid).await;
                "access requested, awaiting approval"
            }
        };
        Ok(render::user_info(user, status))
    }

    async fn announce_request(&self, name: &str, uid: i64) {
        let super_admin = self.state.ctx.settings.super_admin_id;
        if super_admin == 0 {
            return;
        }
        let text = format!("🆕 Access request from {name} (uid {uid})\n/unban_admin {uid} to approve");
        if let Err(e) = self.state.ctx.notifier.send(super_admin, &text).await {
            tracing::warn!("Failed to announce access request: {e}");
        }
    }

    async fn manual_check(&self, chat_id: i64) -> CoreResult<Option<String>> {
        if self.state.scheduler.is_busy() {
            return Err(CoreError::CycleInProgress);
        }
        let mut status = StatusMessage::open(&self.client, chat_id, "🔍 Manual check starting")
            .await
            .map_err(delivery)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = &self.state.scheduler;
        let check = async move {
            let result = scheduler.run_manual(Some(&tx)).await;
            drop(tx);
            result
        };
        let relay = relay_progress(&mut status, rx, "🔍 Manual check");
        let (result, ()) = tokio::join!(check, relay);

        let text = match result {
            Ok(report) => render_manual(&report),
            Err(e) => {
                log_failure("manual_check", &e);
                format!("❌ {e}")
            }
        };
        status.finish(&text).await;
        Ok(None)
    }

    async fn check_forward(&self, chat_id: i64, id: i64) -> CoreResult<Option<String>> {
        let forward = self.state.domain_service.get_forward(id).await?;
        if self.state.scheduler.is_busy() {
            return Err(CoreError::CycleInProgress);
        }
        let header = format!("🔍 Checking {}", forward.forward_domain);
        let mut status = StatusMessage::open(&self.client, chat_id, &header)
            .await
            .map_err(delivery)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = &self.state.scheduler;
        let check = async move {
            let result = scheduler.check_forward(id, Some(&tx)).await;
            drop(tx);
            result
        };
        let relay = relay_progress(&mut status, rx, &header);
        let (result, ()) = tokio::join!(check, relay);

        let text = match result {
            Ok(ForwardCheck::Switched(switch)) => render::switched(&switch),
            Ok(ForwardCheck::Unreachable { message }) => format!(
                "❌ {} is unreachable: {message}\nNo DNS change was made.",
                forward.forward_domain
            ),
            Err(e) => {
                log_failure("check_forward", &e);
                format!("❌ {e}")
            }
        };
        status.finish(&text).await;
        Ok(None)
    }
}
