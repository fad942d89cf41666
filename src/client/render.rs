// Plain-text rendering of the view models for the terminal.
use crate::client::models::contracts::{ContractDetailView, ContractListView};
use crate::client::models::dashboard::DashboardView;
use crate::client::models::jobs::{JobBoardView, JobDetailView};
use crate::client::models::notifications::NotificationCounter;
use crate::client::models::reviews::ReviewsView;
use crate::client::models::threads::{ThreadDetailView, ThreadListView};
use crate::client::models::view_state::Resource;
use crate::client::models::wallet::WalletView;
use crate::common::models::{Contract, Message, Role};
use crate::utils::format::{budget_label, capitalize, format_currency, format_date};

pub trait Render {
    fn render(&self) -> String;
}

/// Loading and error lines shared by every view; `None` when ready.
fn status_line<T>(resource: &Resource<T>, what: &str) -> Option<String> {
    match resource {
        Resource::Loading => Some(format!("Loading {}...", what)),
        Resource::Failed(message) => Some(message.clone()),
        Resource::Ready(_) => None,
    }
}

fn message_line(message: &Message) -> String {
    let who = message
        .sender
        .as_ref()
        .map(|s| s.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(message.sender_id.as_str());
    format!("[{}] {}: {}", format_date(message.timestamp.as_deref()), who, message.content)
}

fn contract_line(contract: &Contract) -> String {
    format!(
        "{:<10} {:<30} {:<10} {}",
        contract.id,
        contract.title,
        capitalize(contract.status.as_str()),
        contract.counterpart_name()
    )
}

impl Render for JobBoardView {
    fn render(&self) -> String {
        if let Some(line) = status_line(&self.jobs, "jobs") {
            return line;
        }
        let jobs = self.visible();
        if jobs.is_empty() {
            return "No jobs found.".to_string();
        }
        jobs.iter()
            .map(|job| format!("{:<10} {:<40} {}", job.id, job.title, budget_label(job.budget)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Render for JobDetailView {
    fn render(&self) -> String {
        let Some(job) = self.job.ready() else {
            return status_line(&self.job, "job").unwrap_or_default();
        };
        let mut out = format!("{}\n{}\n\n{}\n", job.title, budget_label(job.budget), job.description);
        if let Some(skills) = job.skills.as_ref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Skills: {}\n", skills.join(", ")));
        }
        if let Some(bid) = &self.submitted_bid {
            out.push_str(&format!("Your bid: {}\n", format_currency(bid.amount)));
        }
        out
    }
}

impl Render for ContractListView {
    fn render(&self) -> String {
        if let Some(line) = status_line(&self.contracts, "contracts") {
            return line;
        }
        let visible = self.visible();
        let mut out = if visible.is_empty() {
            "No contracts found.".to_string()
        } else {
            visible.iter().map(|c| contract_line(c)).collect::<Vec<_>>().join("\n")
        };
        if let Some(err) = &self.load_more_error {
            out.push_str(&format!("\n{}", err));
        } else if self.has_more {
            out.push_str("\n(more available)");
        }
        out
    }
}

impl Render for ContractDetailView {
    fn render(&self) -> String {
        let Some(contract) = self.contract.ready() else {
            return status_line(&self.contract, "contract").unwrap_or_default();
        };
        let mut out = format!(
            "{} ({})\nWith: {}\nCreated: {}\n",
            contract.title,
            capitalize(contract.status.as_str()),
            contract.counterpart_name(),
            format_date(contract.created_at.as_deref())
        );
        if contract.milestones.is_empty() {
            out.push_str("No milestones yet.\n");
        }
        for milestone in &contract.milestones {
            out.push_str(&format!(
                "  - {:<8} {:<30} {}\n",
                milestone.id,
                milestone.title,
                capitalize(milestone.status.as_str())
            ));
        }
        out
    }
}

impl Render for ThreadListView {
    fn render(&self) -> String {
        let Some(threads) = self.threads.ready() else {
            return status_line(&self.threads, "threads").unwrap_or_default();
        };
        if threads.is_empty() {
            return "No conversations yet.".to_string();
        }
        threads
            .iter()
            .map(|thread| {
                let title = thread.title.as_deref().unwrap_or(thread.id.as_str());
                let last = thread.last_message.as_ref().map(message_line).unwrap_or_else(|| "No messages".to_string());
                format!("{:<10} {:<24} {}", thread.id, title, last)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Render for ThreadDetailView {
    fn render(&self) -> String {
        let Some(thread) = self.thread.ready() else {
            return status_line(&self.thread, "messages").unwrap_or_default();
        };
        if thread.messages.is_empty() {
            return "No messages yet.".to_string();
        }
        thread.messages.iter().map(message_line).collect::<Vec<_>>().join("\n")
    }
}

impl Render for WalletView {
    fn render(&self) -> String {
        match self.wallet.ready() {
            Some(wallet) => format!("Balance: {}", format_currency(wallet.balance)),
            None => status_line(&self.wallet, "wallet").unwrap_or_default(),
        }
    }
}

impl Render for ReviewsView {
    fn render(&self) -> String {
        if let Some(line) = status_line(&self.reviews, "reviews") {
            return line;
        }
        let mut out = match self.average() {
            Some(avg) => format!("Average rating: {:.1}/5\n", avg),
            None => "No reviews yet.\n".to_string(),
        };
        for review in self.visible() {
            out.push_str(&format!(
                "{} {} ({})\n",
                "*".repeat(usize::from(review.rating)),
                review.comment.as_deref().unwrap_or(""),
                review.contract_id
            ));
        }
        out
    }
}

impl Render for DashboardView {
    fn render(&self) -> String {
        if !self.is_authorized() {
            return format!("The {} dashboard is not available for your account.", self.role.as_str());
        }
        let Some(analytics) = self.analytics.ready() else {
            return status_line(&self.analytics, "analytics").unwrap_or_default();
        };
        let mut out = format!("Active contracts: {}\nMessages: {}\n", analytics.active_contracts, analytics.messages);
        match self.role {
            Role::Client => out.push_str(&format!(
                "Total spend: {}\nPending proposals: {}\n",
                format_currency(analytics.total_spend.unwrap_or_default()),
                analytics.pending_proposals.unwrap_or_default()
            )),
            Role::Freelancer => out.push_str(&format!(
                "Total earnings: {}\nProposals sent: {}\n",
                format_currency(analytics.total_earnings.unwrap_or_default()),
                analytics.proposals_sent.unwrap_or_default()
            )),
        }
        out.push_str("Recent activity:\n");
        if analytics.recent_activity.is_empty() {
            out.push_str("  (none)\n");
        }
        for activity in &analytics.recent_activity {
            out.push_str(&format!("  {} ({})\n", activity.description, activity.timestamp));
        }
        out
    }
}

impl Render for NotificationCounter {
    fn render(&self) -> String {
        match self.count {
            0 => "No new notifications".to_string(),
            1 => "1 new notification".to_string(),
            n => format!("{} new notifications", n),
        }
    }
}
