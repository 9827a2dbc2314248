mod health;
mod precedence;
