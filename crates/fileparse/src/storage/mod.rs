pub mod uploads;

pub use uploads::UploadStorage;
