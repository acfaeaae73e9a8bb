//! Route table of the upload API, relative to the configured base URL.
//!
//! ## Structure
//! - **Upload records**
//!   - `GET    api/uploads`       list records
//!   - `POST   api/uploads`       create a record (201 + `Location`)
//!   - `PUT    api/uploads`       update a record (id in the body)
//!   - `GET    api/uploads/{id}`  fetch one record
//!   - `DELETE api/uploads/{id}`  delete one record
//!
//! - **Chunked uploader**
//!   - `GET    api/uploader`      probe whether a chunk is already stored
//!   - `POST   api/uploader`      multipart chunk upload
//!
//! - **Account and footer**
//!   - `POST   api/account/change_password`
//!   - `POST   api/account/reset_password/init`
//!   - `POST   api/account/reset_password/finish`
//!   - `GET    api/cloudinfo`

pub const UPLOADS: &str = "api/uploads";
pub const UPLOADER: &str = "api/uploader";
pub const CHANGE_PASSWORD: &str = "api/account/change_password";
pub const RESET_PASSWORD_INIT: &str = "api/account/reset_password/init";
pub const RESET_PASSWORD_FINISH: &str = "api/account/reset_password/finish";
pub const CLOUD_INFO: &str = "api/cloudinfo";

/// Query parameter carrying the CSRF token on uploader requests. The chunk
/// client cannot be relied on to send the header, the server accepts either.
pub const CSRF_QUERY_PARAM: &str = "_csrf";

/// Header carrying the CSRF token on every other request.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// `api/uploads/{id}`
pub fn upload(id: &str) -> String {
    format!("{UPLOADS}/{id}")
}
