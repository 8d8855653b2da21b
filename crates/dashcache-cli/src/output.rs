//! Plain-text rendering for the terminal.

use chrono::Local;
use dashcache_core::service::{AccountStats, EventStats};
use dashcache_core::utils::truncate_string;
use dashcache_core::{Account, Event, PaginationResult, Resource, ServiceEvent};

pub fn print_accounts(page: &PaginationResult<Account>) {
    println!(
        "{:<8} {:<24} {:<30} {:<10} {:<16} {}",
        "ID", "NAME", "EMAIL", "ROLE", "DEPARTMENT", "STATUS"
    );
    for account in &page.data {
        println!(
            "{:<8} {:<24} {:<30} {:<10} {:<16} {}",
            truncate_string(&account.id.to_string(), 8),
            truncate_string(&account.name, 24),
            truncate_string(&account.email, 30),
            account.role.as_str(),
            truncate_string(account.department.as_deref().unwrap_or("-"), 16),
            if account.is_active() { "active" } else { "inactive" },
        );
    }
    print_page_footer(&page.pagination);
}

pub fn print_events(page: &PaginationResult<Event>) {
    println!(
        "{:<8} {:<32} {:<14} {:<14} {}",
        "ID", "TITLE", "CATEGORY", "DATE", "LOCATION"
    );
    for event in &page.data {
        println!(
            "{:<8} {:<32} {:<14} {:<14} {}",
            truncate_string(&event.id.to_string(), 8),
            truncate_string(&event.title, 32),
            truncate_string(event.category_or_default(), 14),
            event.formatted_date(),
            event.location.as_deref().unwrap_or("-"),
        );
    }
    print_page_footer(&page.pagination);
}

fn print_page_footer(info: &dashcache_core::PageInfo) {
    println!(
        "\nPage {}/{} ({} total){}{}",
        info.page,
        info.total_pages.max(1),
        info.total,
        if info.has_prev { "  [--page prev]" } else { "" },
        if info.has_next { "  [--page next]" } else { "" },
    );
}

pub fn print_stats(accounts: &AccountStats, events: &EventStats) {
    println!("Accounts: {} ({} active, {} inactive)", accounts.total, accounts.active, accounts.inactive);
    for (role, count) in &accounts.by_role {
        println!("  {:<12} {}", role.as_str(), count);
    }
    println!(
        "Events:   {} ({} upcoming, {} past, {} undated)",
        events.total, events.upcoming, events.past, events.undated
    );
    for (category, count) in &events.by_category {
        println!("  {:<12} {}", truncate_string(category, 12), count);
    }
}

/// One line per service event, timestamped.
pub fn print_event<R: Resource>(event: &ServiceEvent<R>) {
    let now = Local::now().format("%H:%M:%S");
    match event {
        ServiceEvent::Loaded { total, view } => {
            println!("[{}] loaded {} {}s ({} shown)", now, total, R::KIND, view.len())
        }
        ServiceEvent::Filtered { view, .. } => {
            println!("[{}] filtered: {} {}s match", now, view.len(), R::KIND)
        }
        ServiceEvent::Created(record) => println!("[{}] created {} {}", now, R::KIND, record.id()),
        ServiceEvent::Updated(record) => println!("[{}] updated {} {}", now, R::KIND, record.id()),
        ServiceEvent::Deleted(id) => println!("[{}] deleted {} {}", now, R::KIND, id),
        ServiceEvent::Error {
            operation,
            message,
            status,
        } => match status {
            Some(status) => eprintln!("[{}] {} failed ({}): {}", now, operation, status, message),
            None => eprintln!("[{}] {} failed: {}", now, operation, message),
        },
    }
}
