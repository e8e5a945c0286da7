use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};

use crate::common::{QuestionAnswerId, SiaeId, TenderId, TenderQuestionId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenderQuestion {
    pub id: TenderQuestionId,
    pub tender_id: TenderId,
    pub text: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionAnswer {
    pub id: QuestionAnswerId,
    pub question_id: TenderQuestionId,
    pub siae_id: SiaeId,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

impl TenderQuestion {
    pub async fn find_for_tender<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM tender_questions WHERE tender_id = $1 ORDER BY position, id",
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }

    /// Replace the tender's questions, keeping the given order.
    pub async fn replace_for_tender(
        tender_id: TenderId,
        texts: &[String],
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        sqlx::query("DELETE FROM tender_questions WHERE tender_id = $1")
            .bind(tender_id)
            .execute(&mut *conn)
            .await?;

        let mut questions = Vec::with_capacity(texts.len());
        for (position, text) in texts.iter().enumerate() {
            let question = sqlx::query_as::<_, Self>(
                r#"
                INSERT INTO tender_questions (id, tender_id, text, position)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(TenderQuestionId::new())
            .bind(tender_id)
            .bind(text)
            .bind(position as i32)
            .fetch_one(&mut *conn)
            .await?;
            questions.push(question);
        }
        Ok(questions)
    }
}

impl QuestionAnswer {
    /// Store an answer verbatim. A supplier answers each question once; a
    /// later answer for the same question is ignored.
    pub async fn save<'e, E: PgExecutor<'e>>(
        question_id: TenderQuestionId,
        siae_id: SiaeId,
        answer: &str,
        executor: E,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO question_answers (id, question_id, siae_id, answer)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (question_id, siae_id) DO NOTHING
            "#,
        )
        .bind(QuestionAnswerId::new())
        .bind(question_id)
        .bind(siae_id)
        .bind(answer)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_for_tender<'e, E: PgExecutor<'e>>(
        tender_id: TenderId,
        executor: E,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT qa.* FROM question_answers qa
            INNER JOIN tender_questions q ON q.id = qa.question_id
            WHERE q.tender_id = $1
            ORDER BY q.position, qa.created_at
            "#,
        )
        .bind(tender_id)
        .fetch_all(executor)
        .await
        .map_err(Into::into)
    }
}
