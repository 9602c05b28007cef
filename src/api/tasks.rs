//! Fire-and-forget background work scheduled by the request handlers.
//!
//! Handlers push task values onto an unbounded channel after their
//! persistence write commits; a single spawned worker drains the channel
//! after the response has gone out. There is no retry and no dead-letter
//! queue: a failed mail or image call is logged, and an image-generation
//! failure is converted into a notification email.

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::api::{
    email::{EmailMessage, Mailer},
    handlers::posts::set_post_image_url,
    imagegen::ImageGenerator,
};

#[derive(Debug, Clone)]
pub enum BackgroundTask {
    RegistrationEmail {
        email: String,
        confirmation_url: String,
    },
    GenerateImage {
        email: String,
        post_id: i64,
        post_url: String,
        prompt: String,
    },
}

/// Cloneable handle handed to handlers for scheduling work.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<BackgroundTask>,
}

impl TaskQueue {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<BackgroundTask>) -> Self {
        Self { tx }
    }

    /// Enqueue a task. A send can only fail once the worker is gone, which
    /// matches the fire-and-forget contract: log and move on.
    pub fn schedule(&self, task: BackgroundTask) {
        if self.tx.send(task).is_err() {
            error!("background worker is gone; dropping task");
        }
    }
}

/// Spawn the worker that owns the mail client, the image generator and a
/// pool handle, and drain tasks until every queue handle is dropped.
pub fn spawn_worker(
    pool: PgPool,
    mailer: Mailer,
    generator: ImageGenerator,
) -> (TaskQueue, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            debug!("running background task: {task:?}");
            run_task(&pool, &mailer, &generator, task).await;
        }
    });

    (TaskQueue::new(tx), handle)
}

async fn run_task(pool: &PgPool, mailer: &Mailer, generator: &ImageGenerator, task: BackgroundTask) {
    match task {
        BackgroundTask::RegistrationEmail {
            email,
            confirmation_url,
        } => {
            if let Err(err) = mailer.send(&registration_message(&email, &confirmation_url)).await {
                error!("Failed to send registration email to '{email}': {err}");
            }
        }
        BackgroundTask::GenerateImage {
            email,
            post_id,
            post_url,
            prompt,
        } => match generator.generate(&prompt).await {
            Ok(output_url) => {
                if let Err(err) = set_post_image_url(pool, post_id, &output_url).await {
                    error!("Failed to store image URL for post {post_id}: {err}");
                    return;
                }
                if let Err(err) = mailer.send(&image_ready_message(&email, &post_url)).await {
                    error!("Failed to send image-ready email to '{email}': {err}");
                }
            }
            Err(err) => {
                // Upstream failures become a notification email, never a retry.
                warn!("Image generation failed for post {post_id}: {err}");
                if let Err(err) = mailer.send(&image_error_message(&email)).await {
                    error!("Failed to send image-error email to '{email}': {err}");
                }
            }
        },
    }
}

fn registration_message(email: &str, confirmation_url: &str) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "[Socialite] Successfully signed up".to_string(),
        body: format!(
            "Hi {email}! You have successfully signed up to Socialite. Please confirm \
             your email by clicking on the following link: {confirmation_url}"
        ),
    }
}

fn image_ready_message(email: &str, post_url: &str) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "[Socialite] Image generation completed".to_string(),
        body: format!(
            "Hi {email}! Your image has been generated and added to your post. Please \
             click on the following link to view it: {post_url}"
        ),
    }
}

fn image_error_message(email: &str) -> EmailMessage {
    EmailMessage {
        to: email.to_string(),
        subject: "[Socialite] Got an error generating image".to_string(),
        body: format!("Hi {email}! Unfortunately there was an error generating an image for your post."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn test_messages_carry_links() {
        let message = registration_message("test@example.net", "http://localhost/confirm/abc");
        assert_eq!(message.to, "test@example.net");
        assert!(message.body.contains("http://localhost/confirm/abc"));

        let message = image_ready_message("test@example.net", "http://localhost/post/1");
        assert!(message.body.contains("http://localhost/post/1"));
    }

    #[tokio::test]
    async fn test_worker_drains_registration_tasks() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        let (queue, handle) = spawn_worker(pool, Mailer::Log, ImageGenerator::Disabled);

        queue.schedule(BackgroundTask::RegistrationEmail {
            email: "test@example.net".to_string(),
            confirmation_url: "http://localhost/confirm/abc".to_string(),
        });

        // Dropping the last queue handle closes the channel; the worker
        // finishes the scheduled task and exits.
        drop(queue);
        handle.await.expect("worker completes");
    }

    #[tokio::test]
    async fn test_schedule_after_worker_gone_is_logged_not_fatal() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        let (queue, handle) = spawn_worker(pool, Mailer::Log, ImageGenerator::Disabled);
        handle.abort();
        let _ = handle.await;

        queue.schedule(BackgroundTask::RegistrationEmail {
            email: "test@example.net".to_string(),
            confirmation_url: "http://localhost/confirm/abc".to_string(),
        });
    }
}
