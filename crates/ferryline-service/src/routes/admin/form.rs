//! Body of an admin save: plain JSON, or a multipart form carrying the JSON
//! in a `payload` field and an optional image file in an `image` field.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;

use crate::errors::ApiError;
use crate::storage::ImageUpload;

pub struct SaveForm<T> {
    pub input: T,
    pub image: Option<ImageUpload>,
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

impl<S, T> FromRequest<S> for SaveForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&request) {
            let Json(input) = Json::<T>::from_request(request, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            return Ok(Self { input, image: None });
        }

        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let mut input = None;
        let mut image = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::BadRequest(err.body_text()))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("payload") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                    let parsed = serde_json::from_str::<T>(&text)
                        .map_err(|err| ApiError::BadRequest(format!("invalid payload: {err}")))?;
                    input = Some(parsed);
                }
                Some("image") => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        image = Some(ImageUpload::new(file_name, content_type, bytes));
                    }
                }
                _ => {}
            }
        }

        let input =
            input.ok_or_else(|| ApiError::BadRequest("missing payload field".to_string()))?;
        Ok(Self { input, image })
    }
}
