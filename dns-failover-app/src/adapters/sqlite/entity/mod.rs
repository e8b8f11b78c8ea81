pub mod domain_record;
pub mod forward_record;
pub mod telegram_admin;
