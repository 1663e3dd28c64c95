//! User-facing strings.

pub const STOPPED: &str =
    "All commands are turned off. You can send other messages now.";
pub const IMAGE_RECEIVED: &str = "✨ Thanks for the image! Ask questions about it if you like! 🌇";
pub const IMAGE_NO_REPLY: &str = "I did not get a valid response for the image.";
pub const IMAGE_FAILED: &str =
    "Sorry, something went wrong while processing your image or the question.";
pub const UNSUPPORTED_MESSAGE: &str =
    "Sorry, I can only read text messages and images.";
pub const NO_REPLY: &str = "I did not get a valid response, please try again.";
pub const RELAY_FAILED: &str = "Sorry, something went wrong while processing your message.";

pub const CAT_INVALID_COUNT: &str = "Please provide a valid number of cat images.";
pub const CAT_USAGE_HINT: &str =
    "Please use the \"cat <number>\" command to ask for cat images, or just send a number.";
pub const CAT_FAILED: &str = "Sorry, something went wrong while fetching the cat images.";

pub const IMG_MISSING_URL: &str = "Please provide an image URL so I can extract its text.";
pub const IMG_RECEIVED: &str = "Image received, preparing a response...";
pub const IMG_NO_TEXT: &str = "Sorry, I could not extract any text from this image.";
pub const IMG_FAILED: &str = "Sorry, something went wrong while processing the image.";

pub const REPLY_LABEL: &str = "response";
pub const QUESTION_LABEL: &str = "answer to the question";

pub fn cat_preparing(count: u32) -> String {
    format!("Message received, preparing {count} cat images...")
}

pub fn img_extracted(text: &str) -> String {
    format!("Here is the text extracted from the image:\n{text}")
}

pub fn reply_part(label: &str, index: usize, part: &str) -> String {
    format!("Bot: {label} (part {index}):\n{part}")
}
