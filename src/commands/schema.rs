//! `rhsm-register schema` - document the resource attributes

use crate::ui;
use anyhow::Result;
use colored::Colorize;
use rhsm::schema::{self, ATTRIBUTES};

pub fn run(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ATTRIBUTES)?);
        return Ok(());
    }

    ui::header(schema::RESOURCE_TYPE);
    for attr in ATTRIBUTES {
        let mut tags = vec![attr.kind.to_string(), attr.value_kind.to_string()];
        if attr.namevar {
            tags.push(format!("namevar, aliases: {}", schema::NAMEVAR_ALIASES.join(", ")));
        }
        if attr.sensitive {
            tags.push("sensitive".to_string());
        }
        println!();
        println!("  {} {}", attr.name.bold(), format!("[{}]", tags.join(", ")).dimmed());
        println!("    {}", attr.doc);
    }
    Ok(())
}
