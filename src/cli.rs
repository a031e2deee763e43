use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use xt_transform::Side;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RecordSide {
    Key,
    Value,
}

impl From<RecordSide> for Side {
    fn from(side: RecordSide) -> Self {
        match side {
            RecordSide::Key => Side::Key,
            RecordSide::Value => Side::Value,
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The XML document to convert
    pub input: PathBuf,

    /// Schema file or URL; repeat to compile several sources together
    #[arg(short, long = "schema", required = true)]
    pub schemas: Vec<String>,

    /// Package the shape names are qualified with
    #[arg(long)]
    pub package: Option<String>,

    /// Fail on schema constructs that have no field representation
    #[arg(long)]
    pub strict: bool,

    /// Suffix colliding shape and field names instead of failing
    #[arg(long)]
    pub resolve_name_conflicts: bool,

    /// Allow a XML Document Type Definition (DTD) to occur
    #[arg(long)]
    pub allow_dtd: bool,

    /// Topic receiving the record when the document does not convert
    #[arg(long)]
    pub reroute_topic: Option<String>,

    /// Record side the document is placed on
    #[arg(long, value_enum, default_value = "value")]
    pub side: RecordSide,

    /// Print the compiled shapes before the record
    #[arg(long)]
    pub print_shapes: bool,

    /// More logging; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
