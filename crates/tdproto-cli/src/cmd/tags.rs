//! `tdproto tags`

use anyhow::{Result, bail};
use clap::Args;
use std::io::Write;
use tdproto_core::{Catalogue, ShapeDescriptor, ShapeRole};

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Only constructors of this class
    #[arg(long)]
    pub class: Option<String>,

    /// Only request functions
    #[arg(long, conflicts_with = "class")]
    pub requests: bool,

    /// Print field layouts too
    #[arg(short, long)]
    pub fields: bool,
}

pub fn run(catalogue: &Catalogue, args: TagsArgs) -> Result<()> {
    if let Some(class) = &args.class {
        if catalogue.class(class).is_none() {
            bail!("unknown class `{}`", class);
        }
    }

    let mut shapes: Vec<&ShapeDescriptor> = catalogue
        .shapes()
        .filter(|shape| match (&args.class, &shape.role) {
            (Some(class), ShapeRole::Data { class: of }) => of == class,
            (Some(_), ShapeRole::Request { .. }) => false,
            (None, _) => !args.requests || shape.is_request(),
        })
        .collect();
    shapes.sort_by(|a, b| a.tag.cmp(&b.tag));

    let mut out = std::io::stdout().lock();
    for shape in shapes {
        writeln!(out, "{}", describe(shape, args.fields))?;
    }
    Ok(())
}

fn describe(shape: &ShapeDescriptor, fields: bool) -> String {
    let mut line = match &shape.role {
        ShapeRole::Data { class } => format!("{} : {}", shape.tag, class),
        ShapeRole::Request { returns } => format!("{} -> {}", shape.tag, returns),
    };
    if fields && !shape.fields.is_empty() {
        let specs: Vec<String> = shape.fields.iter().map(ToString::to_string).collect();
        line.push_str(&format!(" {{ {} }}", specs.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_roles_and_fields() {
        let catalogue = Catalogue::bundled().unwrap();
        let get_chat = catalogue.shape("getChat").unwrap();
        assert_eq!(describe(get_chat, false), "getChat -> Chat");
        assert_eq!(describe(get_chat, true), "getChat -> Chat { chat_id:int53 }");

        let title = catalogue.shape("updateChatTitle").unwrap();
        assert_eq!(
            describe(title, true),
            "updateChatTitle : Update { chat_id:int53, title:string }"
        );
        assert_eq!(describe(catalogue.shape("ok").unwrap(), true), "ok : Ok");
    }
}
