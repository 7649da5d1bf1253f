// ABOUTME: SMS TPDU message models: SUBMIT, DELIVER and STATUS-REPORT
// ABOUTME: Also hosts user data handling, submit segmentation and multipart reassembly

mod deliver;
mod reassembly;
mod status_report;
mod submit;
mod user_data;

pub use deliver::SmsDeliver;
pub use reassembly::{Concatenated, Reassembler};
pub use status_report::SmsStatusReport;
pub use submit::{EncodedPdu, SmsSubmit, SubmitOptions, encode_submit, split_text};
pub use user_data::{UserData, decode_ucs2, encode_ucs2};

/// Any PDU a modem hands back when listing, reading or pushing messages
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedPdu {
    Deliver(SmsDeliver),
    Submit(SmsSubmit),
    StatusReport(SmsStatusReport),
}
