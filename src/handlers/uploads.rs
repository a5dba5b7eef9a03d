use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum_extra::extract::Multipart;
use tokio::fs;
use uuid::Uuid;

use crate::error::AppError;

/// URL prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Lowercased extension of an accepted image filename.
pub fn image_extension(filename: &str) -> Option<String> {
    let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|e| *e == extension)
        .then_some(extension)
}

/// Pulls the first file out of a multipart body; `field` names the part.
pub async fn read_image(mut multipart: Multipart, field: &str) -> Result<ImageUpload, AppError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid upload: {}", e)))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let filename = part
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Upload is missing a file name"))?;
        let data = part
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Invalid upload: {}", e)))?;
        if data.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }
        return Ok(ImageUpload { filename, data });
    }

    Err(AppError::validation(format!("Missing '{}' file", field)))
}

/// Writes `upload` under `upload_dir/subdir` with a fresh name and returns its public URL.
pub async fn save_image(upload_dir: &Path, subdir: &str, upload: ImageUpload) -> Result<String, AppError> {
    let extension = image_extension(&upload.filename)
        .ok_or_else(|| AppError::validation("Only png, jpg, jpeg and webp images are accepted"))?;

    let dir: PathBuf = upload_dir.join(subdir);
    if !dir.exists() {
        fs::create_dir_all(&dir).await?;
    }

    let file_name = format!("{}.{}", Uuid::new_v4(), extension);
    fs::write(dir.join(&file_name), &upload.data).await?;
    log::info!("stored upload {}/{}", subdir, file_name);

    Ok(format!("{}/{}/{}", UPLOAD_URL_PREFIX, subdir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_types() {
        assert_eq!(image_extension("logo.PNG"), Some("png".to_string()));
        assert_eq!(image_extension("photo.jpeg"), Some("jpeg".to_string()));
        assert_eq!(image_extension("item.webp"), Some("webp".to_string()));
        assert_eq!(image_extension("notes.pdf"), None);
        assert_eq!(image_extension("no_extension"), None);
    }

    #[tokio::test]
    async fn saves_under_subdirectory() {
        let dir = std::env::temp_dir().join(format!("kanaku360-upload-{}", Uuid::new_v4()));
        let upload = ImageUpload {
            filename: "Logo.png".to_string(),
            data: Bytes::from_static(b"\x89PNG"),
        };

        let url = save_image(&dir, "logos", upload).await.unwrap();
        assert!(url.starts_with("/static/uploads/logos/"));
        assert!(url.ends_with(".png"));

        let stored = dir.join("logos").join(url.rsplit('/').next().unwrap());
        assert_eq!(fs::read(&stored).await.unwrap(), b"\x89PNG");
        fs::remove_dir_all(&dir).await.unwrap();
    }
}
