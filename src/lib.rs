#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use vl_serial as serial;
pub use vl_utils as utils;
