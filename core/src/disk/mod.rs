//! Partition table writers: protective MBR and mirrored GPT.

pub mod gpt;
pub mod mbr;
