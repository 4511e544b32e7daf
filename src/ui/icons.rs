//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Workflow indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static RETRY: Emoji<'_, '_> = Emoji("🔄 ", "[RETRY]");
pub static GATE: Emoji<'_, '_> = Emoji("🚧 ", "[GATE]");
pub static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "[PAUSED]");
pub static DOCUMENT: Emoji<'_, '_> = Emoji("📄 ", "");
