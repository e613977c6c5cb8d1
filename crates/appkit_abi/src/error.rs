use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum ABIError {
    #[snafu(display("ABI validation failed: {message}"))]
    ValidationError { message: String },

    #[snafu(display("ABI encoding failed: {message}"))]
    EncodingError { message: String },

    #[snafu(display("ABI decoding failed: {message}"))]
    DecodingError { message: String },
}
