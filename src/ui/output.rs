//! Step and summary lines, framed by cliclack on a terminal

use super::context::UiContext;
use console::{style, Style, StyledObject};

/// Plain-mode line: `  [TAG] message`
fn plain(tag: StyledObject<&str>, message: &str) {
    println!("  {} {}", tag, message);
}

pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).green().bold()).ok();
    } else {
        println!("{}\n", style(title).bold());
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!();
        plain(style("[OK]").green(), message);
    }
}

pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!();
        plain(style("[WARN]").yellow(), message);
    }
}

/// Heading for a group of key/value lines
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        plain(style("[OK]").green(), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step_ok(ctx, &format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        plain(style("[WARN]").yellow(), message);
    }
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step_warn(ctx, &format!("{} - {}", message, style(hint).dim()));
}

pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    let line = format!("{}: {}", message, style(detail).red());
    if ctx.use_fancy_output() {
        cliclack::log::error(line).ok();
    } else {
        plain(style("[FAIL]").red(), &line);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        plain(style("[INFO]").cyan(), message);
    }
}

/// Dim follow-up line under a step
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("    {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key/value line colored green when `ok`, yellow otherwise
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.use_fancy_output() {
        let color = if ok { Style::new().green() } else { Style::new().yellow() };
        println!("  {}: {}", style(key).dim(), color.apply_to(value));
    } else {
        let tag = if ok { style("[OK]").green() } else { style("[WARN]").yellow() };
        println!("  {} {}: {}", tag, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_does_not_panic() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "Cache storage");
        section(&ctx, "Models");
        step_ok_detail(&ctx, "Installed", "8 assets");
        step_warn_hint(&ctx, "Verification failed", "kept 2 partitions");
        step_error_detail(&ctx, "Missing", "https://app.example/app.js");
        key_value_status(&ctx, "asr", "not cached", false);
        outro_success(&ctx, "Done");
    }
}
