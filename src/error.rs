use warp::reject::Reject;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("resource does not exist")]
    NotFound,
    #[error("resource already exists")]
    AlreadyExists,
    #[error("error accessing the database file")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("error encoding or decoding the database document")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("no authorization header included in request")]
    MissingAuthHeader,
    #[error("malformed authorization header")]
    MalformedAuthHeader,
    #[error("invalid token")]
    InvalidToken {
        #[source]
        source: Option<jsonwebtoken::errors::Error>,
    },
    #[error("token was not issued for this purpose")]
    WrongIssuer,
    #[error("token has been revoked")]
    Revoked,
    #[error("email or password incorrect")]
    LoginFailed,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("error hashing password")]
    Hashing {
        #[from]
        source: argon2::Error,
    },
    #[error("error signing token")]
    Signing {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("chirp is too long ({length} characters, at most {max} allowed)")]
    ChirpTooLong { length: usize, max: usize },
    #[error("{0}")]
    Malformed(String),
}

/// Everything a request can fail with. Handlers bubble it up with `?` and
/// `handle_api_errors` turns it into a response.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not allowed to modify this resource")]
    Forbidden,
}

impl Reject for ApiError {}
