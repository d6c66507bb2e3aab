pub mod amplicon_otu;
