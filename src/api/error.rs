use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

use crate::Error;

fn status(error: &Error) -> Status {
    match error {
        Error::Validation(_) | Error::Datetime(_) | Error::InvalidPatch(_) => {
            Status::UnprocessableEntity
        }
        Error::NotFound(_, _) => Status::NotFound,
        Error::AlreadySubmitting => Status::Conflict,
        Error::ApiError(_) | Error::InvalidResponse(_, _) => Status::BadGateway,
        Error::Config(_) | Error::FormatError | Error::InternalError => {
            Status::InternalServerError
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = status(&self);
        if status.code >= 500 {
            log::error!("request failed: {:?}", self);
        } else {
            log::info!("request rejected: {}", self);
        }

        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        Response::build()
            .status(status)
            .sized_body(body.len(), Cursor::new(body))
            .header(ContentType::JSON)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordId, Series};

    #[test]
    fn errors_map_to_http_statuses() {
        assert_eq!(
            status(&Error::validation("amount")),
            Status::UnprocessableEntity
        );
        assert_eq!(
            status(&Error::NotFound(Series::Fuel, RecordId::from("x"))),
            Status::NotFound
        );
        assert_eq!(status(&Error::AlreadySubmitting), Status::Conflict);
        assert_eq!(status(&Error::FormatError), Status::InternalServerError);
    }
}
