use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trellis-rs",
    about = "Order and orient assembly contigs into scaffolds from Hi-C link evidence",
    version
)]
pub struct Args {
    /// Contig FASTA; its .fai index must sit beside it
    pub contigs: PathBuf,

    /// Binary Hi-C link dump (.bin)
    pub links: PathBuf,

    /// AGP file (for rescaffolding)
    #[arg(short = 'a', long = "agp", value_name = "AGP")]
    pub agp: Option<PathBuf>,

    /// List of resolutions in ascending order [automatic]
    #[arg(short = 'r', long = "resolutions", value_name = "INT[,INT,...]")]
    pub resolutions: Option<String>,

    /// Restriction enzyme cutting sites, comma separated (one N wildcard each)
    #[arg(short = 'e', long = "enzymes", value_name = "STR")]
    pub enzymes: Option<String>,

    /// Minimum length of a contig to scaffold
    #[arg(short = 'l', long = "min-len", value_name = "INT", default_value_t = 0)]
    pub min_len: u32,

    /// Minimum mapping quality
    #[arg(short = 'q', long = "min-mapq", value_name = "INT", default_value_t = 10)]
    pub min_mapq: u8,

    /// Do not do contig error correction
    #[arg(long)]
    pub no_contig_ec: bool,

    /// Do not do scaffold error correction
    #[arg(long)]
    pub no_scaffold_ec: bool,

    /// Do not do memory check at runtime
    #[arg(long)]
    pub no_mem_check: bool,

    /// Prefix of output files
    #[arg(short = 'o', long = "out", value_name = "PREFIX", default_value = "trellis.out")]
    pub out: String,

    /// Verbose level
    #[arg(short = 'v', long = "verbose", value_name = "INT", default_value_t = 0)]
    pub verbose: u8,

    /// Developer-only: override the memory budget in bytes instead of
    /// probing system RAM
    #[arg(long = "max-rss", value_name = "BYTES", hide = true)]
    pub max_rss: Option<u64>,
}
