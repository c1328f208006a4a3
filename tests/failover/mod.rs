mod manual_reset;
mod stream_error;
