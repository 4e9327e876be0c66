//! Contract tests for the share_codec component
