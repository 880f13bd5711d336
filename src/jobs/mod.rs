pub mod abandonment_sweep;
