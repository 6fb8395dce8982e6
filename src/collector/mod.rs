pub mod lag_extractor;
