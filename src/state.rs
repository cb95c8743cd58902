use std::{sync::Arc, time::Instant};

use axum::extract::FromRef;

use crate::{
    auth::{JwtKeys, PgUserStore, UserStore},
    books::{BookStore, PgBookStore},
    config::{AppConfig, Environment},
    db,
    middleware::RateLimiter,
};

/// Shared per-process handles. Holds no authoritative data: users and books
/// live in the stores.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub jwt: JwtKeys,
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db).await?;
        if config.env != Environment::Test {
            db::ensure_schema(&pool).await?;
        }
        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgBookStore::new(pool)),
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        books: Arc<dyn BookStore>,
    ) -> Self {
        Self {
            users,
            books,
            jwt: JwtKeys::new(&config.jwt),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// State backed by in-memory stores sharing one user table.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(AppConfig::for_tests())
    }

    #[cfg(test)]
    pub fn fake_with(config: AppConfig) -> Self {
        let users = fakes::MemoryUsers::default();
        let books = fakes::MemoryBooks::with_users(&users);
        Self::from_parts(config, Arc::new(users), Arc::new(books))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::{
        atomic::{AtomicI32, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use crate::{
        auth::{repo::DUPLICATE_USER, User, UserStore},
        books::{dto::BookInput, Book, BookStore, BookWithOwner},
        error::{AppError, AppResult},
    };

    #[derive(Default, Clone)]
    pub struct MemoryUsers {
        rows: Arc<Mutex<Vec<User>>>,
        next_id: Arc<AtomicI32>,
    }

    impl MemoryUsers {
        pub fn count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUsers {
        async fn exists(&self, email: &str, username: &str) -> AppResult<bool> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().any(|u| u.email == email || u.username == username))
        }

        async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|u| u.email == email).cloned())
        }

        async fn create(&self, username: &str, email: &str, password_hash: &str) -> AppResult<User> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|u| u.email == email || u.username == username) {
                return Err(AppError::Conflict(DUPLICATE_USER.into()));
            }
            let user = User {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                username: username.into(),
                email: email.into(),
                password_hash: password_hash.into(),
                created_at: OffsetDateTime::now_utc(),
            };
            rows.push(user.clone());
            Ok(user)
        }
    }

    #[derive(Default)]
    pub struct MemoryBooks {
        rows: Mutex<Vec<Book>>,
        users: Arc<Mutex<Vec<User>>>,
        next_id: AtomicI32,
    }

    impl MemoryBooks {
        pub fn with_users(users: &MemoryUsers) -> Self {
            Self {
                users: users.rows.clone(),
                ..Self::default()
            }
        }

        fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (OffsetDateTime, i32)) {
            rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
        }
    }

    #[async_trait]
    impl BookStore for MemoryBooks {
        async fn create(&self, owner_id: i32, book: &BookInput) -> AppResult<Book> {
            let now = OffsetDateTime::now_utc();
            let row = Book {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                title: book.title.clone(),
                author: book.author.clone(),
                year: book.year,
                user_id: owner_id,
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn list_all(&self) -> AppResult<Vec<BookWithOwner>> {
            let users = self.users.lock().unwrap();
            let mut out: Vec<BookWithOwner> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter_map(|b| {
                    let owner = users.iter().find(|u| u.id == b.user_id)?;
                    Some(BookWithOwner {
                        id: b.id,
                        title: b.title.clone(),
                        author: b.author.clone(),
                        year: b.year,
                        created_at: b.created_at,
                        updated_at: b.updated_at,
                        owner_id: owner.id,
                        owner_username: owner.username.clone(),
                    })
                })
                .collect();
            Self::newest_first(&mut out, |b| (b.created_at, b.id));
            Ok(out)
        }

        async fn list_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>> {
            let mut out: Vec<Book> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.user_id == owner_id)
                .cloned()
                .collect();
            Self::newest_first(&mut out, |b| (b.created_at, b.id));
            Ok(out)
        }

        async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
            Ok(self.rows.lock().unwrap().iter().find(|b| b.id == id).cloned())
        }

        async fn owner_of(&self, id: i32) -> AppResult<Option<i32>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.id == id)
                .map(|b| b.user_id))
        }

        async fn update(&self, id: i32, book: &BookInput) -> AppResult<Option<Book>> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.iter_mut().find(|b| b.id == id).map(|row| {
                row.title = book.title.clone();
                row.author = book.author.clone();
                row.year = book.year;
                row.updated_at = OffsetDateTime::now_utc();
                row.clone()
            }))
        }

        async fn delete(&self, id: i32) -> AppResult<Option<Book>> {
            let mut rows = self.rows.lock().unwrap();
            let idx = rows.iter().position(|b| b.id == id);
            Ok(idx.map(|i| rows.remove(i)))
        }
    }

    /// Store whose every call fails, for exercising the 500 path.
    pub struct BrokenBooks;

    #[async_trait]
    impl BookStore for BrokenBooks {
        async fn create(&self, _: i32, _: &BookInput) -> AppResult<Book> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn list_all(&self) -> AppResult<Vec<BookWithOwner>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn list_by_owner(&self, _: i32) -> AppResult<Vec<Book>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn find_by_id(&self, _: i32) -> AppResult<Option<Book>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn owner_of(&self, _: i32) -> AppResult<Option<i32>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn update(&self, _: i32, _: &BookInput) -> AppResult<Option<Book>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn delete(&self, _: i32) -> AppResult<Option<Book>> {
            Err(AppError::Internal("connection refused".into()))
        }
    }
}
