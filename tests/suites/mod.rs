mod app_gate;
mod dispatch;
mod upgrade;
mod upstream;
